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


//! Integration tests for proximity queries

use reliefgrid_core::{encode, Category, FieldUpdates, ItemKey, ValidationError};
use reliefgrid_index::{IndexError, NewPoint, ProximityIndex};
use reliefgrid_storage::{KeyedStore, StorageError, TableStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn index() -> ProximityIndex {
    ProximityIndex::with_defaults(Arc::new(TableStore::in_memory()))
}

async fn report(index: &ProximityIndex, lat: Decimal, lng: Decimal, who: &str) {
    index
        .create_point(NewPoint::new(lat, lng, Category::Rubble, who).with_entity_id(who))
        .await
        .unwrap();
}

/// A point stored at the center comes back at radius 0 and stays out of a
/// query whose geohash starts with another symbol.
#[tokio::test]
async fn test_end_to_end_istanbul() {
    assert_eq!(encode(41.015, 29.0, 6).unwrap().as_str(), "sxk97f");

    let index = index();
    report(&index, dec!(41.015), dec!(29.0), "u1").await;

    let hits = index.query(dec!(41.015), dec!(29.0), 0).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].sk, "sxk97f#u1");

    // Sydney encodes to r3gx2f
    let far = index.query(dec!(-33.8688), dec!(151.2093), 0).await.unwrap();
    assert!(far.is_empty());
    let far = index.query(dec!(-33.8688), dec!(151.2093), 5).await.unwrap();
    assert!(far.is_empty());
}

#[tokio::test]
async fn test_radius_widens_results() {
    let index = index();
    report(&index, dec!(41.015), dec!(29.0), "center").await; // sxk97f
    report(&index, dec!(41.015), dec!(28.99), "west").await; // sxk97d
    report(&index, dec!(41.02), dec!(29.01), "north").await; // sxk9k5
    report(&index, dec!(37.0), dec!(35.32), "adana").await; // sy947x

    let count = |radius| {
        let index = index.clone();
        async move { index.query(dec!(41.015), dec!(29.0), radius).await.unwrap().len() }
    };
    assert_eq!(count(0).await, 1);
    assert_eq!(count(1).await, 2);
    assert_eq!(count(2).await, 3);
    assert_eq!(count(4).await, 3);
    assert_eq!(count(5).await, 4);
}

#[tokio::test]
async fn test_radius_equal_to_precision_fails_before_lookup() {
    let index = index();
    report(&index, dec!(41.015), dec!(29.0), "u1").await;

    let err = index.query(dec!(41.015), dec!(29.0), 6).await.unwrap_err();
    assert!(matches!(
        err,
        IndexError::Validation(ValidationError::InvalidRadius {
            radius: 6,
            precision: 6
        })
    ));
}

/// Two points a few hundred meters apart on either side of the equator and
/// prime meridian share no geohash prefix at all.
#[tokio::test]
async fn test_adjacent_cell_is_missed() {
    assert_eq!(encode(0.0, 0.0, 6).unwrap().as_str(), "7zzzzz");
    assert_eq!(encode(0.001, 0.001, 6).unwrap().as_str(), "s00000");

    let index = index();
    report(&index, dec!(0.001), dec!(0.001), "ne").await;

    for radius in 0..6 {
        let hits = index.query(dec!(0), dec!(0), radius).await.unwrap();
        assert!(hits.is_empty(), "radius {} found the neighbor", radius);
    }
}

#[tokio::test]
async fn test_manage_points_through_index() {
    let index = index();
    report(&index, dec!(36.2), dec!(36.16), "h1").await; // sy3tyy
    let key = ItemKey::new("POINT", "sy3tyy#h1");

    let updated = index
        .update(&key, &FieldUpdates::new().category(Category::Medical))
        .await
        .unwrap();
    assert_eq!(updated.category, Category::Medical);
    assert_eq!(updated.description, "h1");

    let removed = index.delete(&key).await.unwrap();
    assert_eq!(removed.category, Category::Medical);
    assert!(matches!(
        index.delete(&key).await,
        Err(IndexError::Storage(StorageError::NotFound(_)))
    ));
    assert!(index.query(dec!(36.2), dec!(36.16), 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listing_pages_through_partition() {
    let index = index();
    for i in 0..7 {
        report(&index, dec!(41.015), dec!(29.0), &format!("u{}", i)).await;
    }

    let first = index.list(None, 4).await.unwrap();
    assert_eq!(first.items.len(), 4);
    let second = index.list(first.next_cursor.as_ref(), 4).await.unwrap();
    assert_eq!(second.items.len(), 3);
    assert!(second.next_cursor.is_none());

    let all = index.store().query_prefix("POINT", "").await.unwrap();
    let paged: Vec<_> = first.items.into_iter().chain(second.items).collect();
    assert_eq!(all, paged);
}
