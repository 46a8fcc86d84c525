// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Typed partial updates
//!
//! A `FieldUpdates` names only the attributes to change. Key attributes and
//! coordinates are not updatable: the sort key embeds the geohash of the
//! coordinates, so moving a point means deleting it and creating a new one.

use crate::error::{Result, ValidationError};
use crate::point::{Category, PointRecord};
use serde_json::{Map, Value};

/// One attribute assignment
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Description(String),
    Category(Category),
    /// Replace the whole `extra` map
    Extra(Map<String, Value>),
    /// Set a single `extra` attribute, keeping the others
    ExtraAttribute(String, Value),
}

/// Ordered set of assignments applied in one merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdates {
    updates: Vec<FieldUpdate>,
}

impl FieldUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.updates.push(FieldUpdate::Description(description.into()));
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.updates.push(FieldUpdate::Category(category));
        self
    }

    pub fn extra(mut self, extra: Map<String, Value>) -> Self {
        self.updates.push(FieldUpdate::Extra(extra));
        self
    }

    pub fn extra_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.updates
            .push(FieldUpdate::ExtraAttribute(name.into(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldUpdate> {
        self.updates.iter()
    }

    /// Build from a client-supplied `field -> value` map, checking every
    /// entry against the record schema.
    ///
    /// `extra.<name>` sets a single open attribute.
    pub fn from_json(fields: &Map<String, Value>) -> Result<Self> {
        if fields.is_empty() {
            return Err(ValidationError::invalid(
                "fields",
                "at least one field is required",
            ));
        }

        let mut updates = Self::new();
        for (field, value) in fields {
            updates = match field.as_str() {
                "description" => {
                    let text = value.as_str().ok_or_else(|| {
                        ValidationError::invalid("description", "expected a string")
                    })?;
                    updates.description(text)
                }
                "category" | "type" => {
                    let raw = value.as_str().ok_or_else(|| {
                        ValidationError::invalid("category", "expected a string")
                    })?;
                    updates.category(raw.parse()?)
                }
                "extra" => {
                    let map = value.as_object().ok_or_else(|| {
                        ValidationError::invalid("extra", "expected an object")
                    })?;
                    updates.extra(map.clone())
                }
                "pk" | "sk" | "latitude" | "longitude" | "lat" | "lng" | "created_at" => {
                    return Err(ValidationError::ImmutableField(field.clone()))
                }
                other => match other.strip_prefix("extra.") {
                    Some(name) if !name.is_empty() => {
                        updates.extra_attribute(name, value.clone())
                    }
                    _ => return Err(ValidationError::UnknownField(field.clone())),
                },
            };
        }

        Ok(updates)
    }

    /// Merge into `record`; attributes not named are left untouched.
    pub fn apply(&self, record: &mut PointRecord) {
        for update in &self.updates {
            match update {
                FieldUpdate::Description(text) => record.description = text.clone(),
                FieldUpdate::Category(category) => record.category = *category,
                FieldUpdate::Extra(map) => record.extra = map.clone(),
                FieldUpdate::ExtraAttribute(name, value) => {
                    record.extra.insert(name.clone(), value.clone());
                }
            }
        }
    }
}
