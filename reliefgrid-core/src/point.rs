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

//! Point records
//!
//! A point is one relief report. All points live in a single partition and
//! are ordered by a sort key of the form `{geohash}#{entity_id}`, so every
//! geohash cell maps to one contiguous key range.

use crate::error::{Result, ValidationError};
use crate::geohash::{encode_decimal, Geohash};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Partition holding every point
pub const POINT_PARTITION: &str = "POINT";

/// Separates the geohash from the entity id inside a sort key
pub const KEY_SEPARATOR: char = '#';

/// Kind of relief report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Food,
    Shelter,
    Medical,
    Rubble,
    Person,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Food,
        Category::Shelter,
        Category::Medical,
        Category::Rubble,
        Category::Person,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Shelter => "shelter",
            Category::Medical => "medical",
            Category::Rubble => "rubble",
            Category::Person => "person",
            Category::Other => "other",
        }
    }

    fn expected() -> String {
        Self::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    /// Case-insensitive. Also accepts the identifiers used by the first
    /// mobile client (`gida`, `barinma`, ...).
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        let category = match normalized.as_str() {
            "food" | "gida" => Category::Food,
            "shelter" | "barinma" => Category::Shelter,
            "medical" | "tibbi_yardim" => Category::Medical,
            "rubble" | "yikinti" | "yikim" => Category::Rubble,
            "person" | "insan" => Category::Person,
            "other" | "diger" => Category::Other,
            _ => {
                return Err(ValidationError::InvalidCategory {
                    value: normalized,
                    expected: Self::expected(),
                })
            }
        };
        Ok(category)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary key of a stored item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub pk: String,
    pub sk: String,
}

impl ItemKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Build the sort key `{geohash}#{entity_id}` under `partition`
    pub fn for_point(partition: &str, geohash: &Geohash, entity_id: &str) -> Self {
        Self::new(
            partition,
            format!("{}{}{}", geohash, KEY_SEPARATOR, entity_id),
        )
    }

    /// Geohash part of the sort key
    pub fn geohash_part(&self) -> &str {
        self.sk
            .split_once(KEY_SEPARATOR)
            .map(|(hash, _)| hash)
            .unwrap_or(&self.sk)
    }

    /// Entity part of the sort key
    pub fn entity_part(&self) -> Option<&str> {
        self.sk.split_once(KEY_SEPARATOR).map(|(_, id)| id)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pk.trim().is_empty() {
            return Err(ValidationError::MissingField("pk".to_string()));
        }
        if self.sk.trim().is_empty() {
            return Err(ValidationError::MissingField("sk".to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pk, self.sk)
    }
}

/// Exact coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: Decimal,
    pub longitude: Decimal,
}

impl GeoPoint {
    pub fn new(latitude: Decimal, longitude: Decimal) -> Result<Self> {
        if latitude < Decimal::from(-90) || latitude > Decimal::from(90) {
            return Err(ValidationError::LatitudeOutOfRange(latitude.to_string()));
        }
        if longitude < Decimal::from(-180) || longitude > Decimal::from(180) {
            return Err(ValidationError::LongitudeOutOfRange(longitude.to_string()));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn geohash(&self, precision: usize) -> Result<Geohash> {
        encode_decimal(self.latitude, self.longitude, precision)
    }
}

/// One indexed relief report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    /// Partition (collection discriminator)
    pub pk: String,
    /// `{geohash}#{entity_id}`
    pub sk: String,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub category: Category,
    pub description: String,
    /// Open attributes, e.g. extraction output from the voice pipeline
    #[serde(default)]
    pub extra: Map<String, Value>,
    /// Epoch seconds, set at write time
    pub created_at: i64,
}

impl PointRecord {
    /// Create a record whose sort key is derived from `location`.
    ///
    /// The geohash is always computed here from the exact decimals that are
    /// stored alongside it.
    pub fn new(
        partition: &str,
        entity_id: &str,
        location: GeoPoint,
        category: Category,
        description: impl Into<String>,
        precision: usize,
    ) -> Result<Self> {
        if entity_id.trim().is_empty() {
            return Err(ValidationError::MissingField("entity_id".to_string()));
        }
        if entity_id.contains(KEY_SEPARATOR) {
            return Err(ValidationError::invalid(
                "entity_id",
                format!("must not contain '{}'", KEY_SEPARATOR),
            ));
        }

        let geohash = location.geohash(precision)?;
        let key = ItemKey::for_point(partition, &geohash, entity_id);

        Ok(Self {
            pk: key.pk,
            sk: key.sk,
            latitude: location.latitude,
            longitude: location.longitude,
            category,
            description: description.into(),
            extra: Map::new(),
            created_at: chrono::Utc::now().timestamp(),
        })
    }

    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.pk.clone(), self.sk.clone())
    }

    pub fn location(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    pub fn geohash_prefix(&self) -> &str {
        self.sk
            .split_once(KEY_SEPARATOR)
            .map(|(hash, _)| hash)
            .unwrap_or(&self.sk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geohash::POINT_PRECISION;
    use rust_decimal_macros::dec;

    #[test]
    fn test_category_parse() {
        assert_eq!("food".parse::<Category>().unwrap(), Category::Food);
        assert_eq!("  MEDICAL ".parse::<Category>().unwrap(), Category::Medical);
        assert_eq!("Tibbi_Yardim".parse::<Category>().unwrap(), Category::Medical);
        assert_eq!("insan".parse::<Category>().unwrap(), Category::Person);

        let err = "volcano".parse::<Category>().unwrap_err();
        match err {
            ValidationError::InvalidCategory { value, expected } => {
                assert_eq!(value, "volcano");
                assert!(expected.contains("shelter"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_category_serde_is_canonical() {
        let json = serde_json::to_string(&Category::Rubble).unwrap();
        assert_eq!(json, "\"rubble\"");
    }

    #[test]
    fn test_record_sort_key() {
        let location = GeoPoint::new(dec!(41.015), dec!(29.0)).unwrap();
        let record = PointRecord::new(
            POINT_PARTITION,
            "user-1",
            location,
            Category::Shelter,
            "tent area",
            POINT_PRECISION,
        )
        .unwrap();

        assert_eq!(record.pk, "POINT");
        assert_eq!(record.sk, "sxk97f#user-1");
        assert_eq!(record.geohash_prefix(), "sxk97f");
        assert_eq!(record.latitude, dec!(41.015));
        assert_eq!(record.key().entity_part(), Some("user-1"));
        assert!(record.created_at > 0);
    }

    #[test]
    fn test_record_rejects_bad_entity() {
        let location = GeoPoint::new(dec!(1), dec!(1)).unwrap();
        assert!(PointRecord::new("POINT", "", location, Category::Other, "", 6).is_err());
        assert!(PointRecord::new("POINT", "a#b", location, Category::Other, "", 6).is_err());
    }

    #[test]
    fn test_geopoint_range() {
        assert!(GeoPoint::new(dec!(-90), dec!(180)).is_ok());
        assert!(GeoPoint::new(dec!(90.0001), dec!(0)).is_err());
        assert!(GeoPoint::new(dec!(0), dec!(-180.5)).is_err());
    }

    #[test]
    fn test_persisted_decimals_are_lossless() {
        let location = GeoPoint::new(dec!(41.0150000000000001), dec!(29)).unwrap();
        let record =
            PointRecord::new("POINT", "e1", location, Category::Food, "bread", 6).unwrap();

        let json = serde_json::to_string(&record).unwrap();
        let back: PointRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.latitude, dec!(41.0150000000000001));
    }

    #[test]
    fn test_record_sort_key_cell_contains_point() {
        let location = GeoPoint::new(dec!(0), dec!(90.000000000000000001)).unwrap();
        let record =
            PointRecord::new("POINT", "e1", location, Category::Food, "bread", 6).unwrap();

        let cell = crate::geohash::decode_bounds(record.geohash_prefix()).unwrap();
        assert!(!record.sk.starts_with("mzzzzz"));
        assert_eq!(cell.min_lng, 90.0);
        assert!(cell.min_lat <= 0.0 && cell.max_lat >= 0.0);
    }
}
