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


//! Proximity lookups over geohash-prefixed sort keys
//!
//! A query never measures distance. It widens the search by dropping
//! `radius` trailing symbols from the center's geohash and returns every
//! point whose sort key shares what is left:
//!
//! ```text
//! center 41.015,29.0  ->  sxk97f
//! radius 0            ->  sxk97f   (~1.2km x 0.6km cell)
//! radius 1            ->  sxk97    (~4.9km x 4.9km)
//! radius 2            ->  sxk9     (~39km x 20km)
//! ```
//!
//! Points just across a cell edge from the center share a shorter prefix
//! (sometimes none at all) and are missed at small radii.

use crate::error::IndexResult;
use reliefgrid_core::{
    geohash, Category, Decimal, FieldUpdates, GeoPoint, ItemKey, PointRecord, ValidationError,
    POINT_PARTITION, POINT_PRECISION,
};
use reliefgrid_storage::{Cursor, KeyedStore, Page};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Request for a manually authored point
#[derive(Debug, Clone)]
pub struct NewPoint {
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub category: Category,
    pub description: String,
    /// Reporter or emergency id; a fresh one is generated when absent
    pub entity_id: Option<String>,
    pub extra: Map<String, Value>,
}

impl NewPoint {
    pub fn new(
        latitude: Decimal,
        longitude: Decimal,
        category: Category,
        description: impl Into<String>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            category,
            description: description.into(),
            entity_id: None,
            extra: Map::new(),
        }
    }

    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }
}

/// Geohash proximity index over one partition of a [`KeyedStore`]
#[derive(Clone)]
pub struct ProximityIndex {
    store: Arc<dyn KeyedStore>,
    partition: String,
    precision: usize,
}

impl ProximityIndex {
    pub fn new(
        store: Arc<dyn KeyedStore>,
        partition: impl Into<String>,
        precision: usize,
    ) -> IndexResult<Self> {
        geohash::validate_precision(precision)?;
        let partition = partition.into();
        if partition.trim().is_empty() {
            return Err(ValidationError::MissingField("partition".to_string()).into());
        }
        Ok(Self {
            store,
            partition,
            precision,
        })
    }

    /// `POINT` partition at precision 6
    pub fn with_defaults(store: Arc<dyn KeyedStore>) -> Self {
        Self {
            store,
            partition: POINT_PARTITION.to_string(),
            precision: POINT_PRECISION,
        }
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn store(&self) -> &Arc<dyn KeyedStore> {
        &self.store
    }

    /// Sort-key prefix searched for `radius` around a center
    pub fn search_prefix(
        &self,
        latitude: Decimal,
        longitude: Decimal,
        radius: i64,
    ) -> IndexResult<String> {
        if radius < 0 || radius >= self.precision as i64 {
            return Err(ValidationError::InvalidRadius {
                radius,
                precision: self.precision,
            }
            .into());
        }

        let center = GeoPoint::new(latitude, longitude)?;
        let full = center.geohash(self.precision)?;
        Ok(full.prefix(self.precision - radius as usize).to_string())
    }

    /// Points whose geohash shares the center's first `precision - radius`
    /// symbols, in sort-key order.
    pub async fn query(
        &self,
        latitude: Decimal,
        longitude: Decimal,
        radius: i64,
    ) -> IndexResult<Vec<PointRecord>> {
        let prefix = self.search_prefix(latitude, longitude, radius)?;
        let points = self.store.query_prefix(&self.partition, &prefix).await?;
        debug!(
            %latitude,
            %longitude,
            radius,
            prefix = %prefix,
            count = points.len(),
            "proximity query"
        );
        Ok(points)
    }

    /// Validate and store a manually authored point
    pub async fn create_point(&self, point: NewPoint) -> IndexResult<PointRecord> {
        let location = GeoPoint::new(point.latitude, point.longitude)?;
        let entity_id = match point.entity_id {
            Some(id) => id,
            None => uuid::Uuid::new_v4().simple().to_string(),
        };

        let record = PointRecord::new(
            &self.partition,
            &entity_id,
            location,
            point.category,
            point.description,
            self.precision,
        )?
        .with_extra(point.extra);

        let saved = self.store.save(record).await?;
        info!(sk = %saved.sk, category = %saved.category, "created point");
        Ok(saved)
    }

    /// One page of every point in the partition
    pub async fn list(&self, cursor: Option<&Cursor>, limit: usize) -> IndexResult<Page> {
        Ok(self
            .store
            .query_partition(&self.partition, cursor, limit)
            .await?)
    }

    pub async fn update(&self, key: &ItemKey, updates: &FieldUpdates) -> IndexResult<PointRecord> {
        key.validate()?;
        if updates.is_empty() {
            return Err(ValidationError::invalid("fields", "at least one field is required").into());
        }
        Ok(self.store.update(key, updates).await?)
    }

    pub async fn delete(&self, key: &ItemKey) -> IndexResult<PointRecord> {
        key.validate()?;
        let removed = self.store.delete(&key.pk, &key.sk).await?;
        info!(pk = %key.pk, sk = %key.sk, "deleted point");
        Ok(removed)
    }
}

impl std::fmt::Debug for ProximityIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProximityIndex")
            .field("partition", &self.partition)
            .field("precision", &self.precision)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndexError;
    use reliefgrid_storage::TableStore;
    use rust_decimal_macros::dec;

    fn index() -> ProximityIndex {
        ProximityIndex::with_defaults(Arc::new(TableStore::in_memory()))
    }

    #[test]
    fn test_search_prefix_shrinks_with_radius() {
        let index = index();
        let prefixes: Vec<String> = (0..6)
            .map(|r| index.search_prefix(dec!(41.015), dec!(29.0), r).unwrap())
            .collect();
        assert_eq!(prefixes, ["sxk97f", "sxk97", "sxk9", "sxk", "sx", "s"]);
    }

    #[test]
    fn test_radius_bounds() {
        let index = index();
        for radius in [-1, 6, 7] {
            assert!(matches!(
                index.search_prefix(dec!(41.015), dec!(29.0), radius),
                Err(IndexError::Validation(ValidationError::InvalidRadius { .. }))
            ));
        }
    }

    #[test]
    fn test_rejects_bad_precision_and_partition() {
        let store: Arc<dyn KeyedStore> = Arc::new(TableStore::in_memory());
        assert!(ProximityIndex::new(store.clone(), "POINT", 0).is_err());
        assert!(ProximityIndex::new(store.clone(), "POINT", 13).is_err());
        assert!(ProximityIndex::new(store.clone(), " ", 6).is_err());
        assert_eq!(ProximityIndex::new(store, "POINT", 5).unwrap().precision(), 5);
    }

    #[tokio::test]
    async fn test_create_point_derives_key() {
        let index = index();
        let point = index
            .create_point(
                NewPoint::new(dec!(41.015), dec!(29.0), Category::Shelter, "tent needed")
                    .with_entity_id("u42"),
            )
            .await
            .unwrap();
        assert_eq!(point.pk, "POINT");
        assert_eq!(point.sk, "sxk97f#u42");
        assert_eq!(point.latitude, dec!(41.015));
        assert!(point.created_at > 0);
    }

    #[tokio::test]
    async fn test_create_point_generates_entity_id() {
        let index = index();
        let point = index
            .create_point(NewPoint::new(dec!(41.015), dec!(29.0), Category::Food, ""))
            .await
            .unwrap();
        let entity = point.key().entity_part().unwrap().to_string();
        assert_eq!(entity.len(), 32);
        assert!(entity.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_create_point_rejects_out_of_range() {
        let index = index();
        let err = index
            .create_point(NewPoint::new(dec!(91), dec!(29.0), Category::Food, ""))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::Validation(ValidationError::LatitudeOutOfRange(_))
        ));
        assert!(index.store().query_prefix("POINT", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_requires_fields() {
        let index = index();
        let key = ItemKey::new("POINT", "sxk97f#u1");
        assert!(matches!(
            index.update(&key, &FieldUpdates::new()).await,
            Err(IndexError::Validation(_))
        ));
    }
}
