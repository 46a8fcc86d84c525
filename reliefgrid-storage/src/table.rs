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

//! Partitioned key-value table
//!
//! Items are addressed by `(pk, sk)` and kept in sort-key order within a
//! partition, so a sort-key prefix maps to one contiguous range:
//!
//! ```text
//! pk=POINT  sk=sxk97d#u7
//!           sk=sxk97f#e1   ┐
//!           sk=sxk97f#u3   ├─ query_prefix("POINT", "sxk97f")
//!           sk=sxk97f#u9   ┘
//!           sk=sxk97g#e4
//! ```
//!
//! Every single-item operation runs under the table's write lock, which is
//! the only atomicity the table offers. There are no multi-item transactions.

use crate::cursor::Cursor;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use reliefgrid_core::{FieldUpdates, ItemKey, PointRecord};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Upper bound for one page of a partition scan
pub const MAX_PAGE_SIZE: usize = 1_000;

/// Default page size for partition scans
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// One page of a partition scan
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<PointRecord>,
    /// `None` once the partition is exhausted
    pub next_cursor: Option<Cursor>,
}

/// Result of a conditional create
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Created(PointRecord),
    AlreadyExists(PointRecord),
}

impl SaveOutcome {
    pub fn record(&self) -> &PointRecord {
        match self {
            SaveOutcome::Created(r) | SaveOutcome::AlreadyExists(r) => r,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, SaveOutcome::Created(_))
    }
}

/// Partitioned key-value backend with sort-key range queries
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Upsert. An existing item with the same key is overwritten.
    async fn save(&self, record: PointRecord) -> StorageResult<PointRecord>;

    /// Create only if no item has this key.
    async fn save_if_absent(&self, record: PointRecord) -> StorageResult<SaveOutcome>;

    async fn get(&self, pk: &str, sk: &str) -> StorageResult<Option<PointRecord>>;

    /// All items in `pk` whose sort key starts with `sk_prefix`, in sort-key order.
    async fn query_prefix(&self, pk: &str, sk_prefix: &str) -> StorageResult<Vec<PointRecord>>;

    /// Page through a whole partition.
    async fn query_partition(
        &self,
        pk: &str,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> StorageResult<Page>;

    /// Merge `updates` into an existing item.
    async fn update(&self, key: &ItemKey, updates: &FieldUpdates) -> StorageResult<PointRecord>;

    /// Remove an item, returning its previous value.
    async fn delete(&self, pk: &str, sk: &str) -> StorageResult<PointRecord>;
}

/// Ordered in-memory table, optionally persisted as one JSON file per item
#[derive(Debug)]
pub struct TableStore {
    /// Persistence directory (`None` = memory only)
    dir: Option<PathBuf>,
    items: RwLock<BTreeMap<ItemKey, PointRecord>>,
}

impl TableStore {
    /// Memory-only table, contents are lost on drop
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            items: RwLock::new(BTreeMap::new()),
        }
    }

    /// Open a persisted table, loading any items already on disk
    pub async fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let items = load_items(&dir)?;
        debug!(path = ?dir, count = items.len(), "opened table");

        Ok(Self {
            dir: Some(dir),
            items: RwLock::new(items),
        })
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    fn persist(&self, record: &PointRecord) -> StorageResult<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let path = item_path(dir, &record.key());
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn unpersist(&self, key: &ItemKey) -> StorageResult<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        match std::fs::remove_file(item_path(dir, key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for TableStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[async_trait]
impl KeyedStore for TableStore {
    async fn save(&self, record: PointRecord) -> StorageResult<PointRecord> {
        let key = record.key();
        key.validate()?;

        let mut items = self.items.write().await;
        self.persist(&record)?;
        items.insert(key, record.clone());
        debug!(pk = %record.pk, sk = %record.sk, "saved item");
        Ok(record)
    }

    async fn save_if_absent(&self, record: PointRecord) -> StorageResult<SaveOutcome> {
        let key = record.key();
        key.validate()?;

        let mut items = self.items.write().await;
        if let Some(existing) = items.get(&key) {
            debug!(pk = %key.pk, sk = %key.sk, "conditional create skipped, item exists");
            return Ok(SaveOutcome::AlreadyExists(existing.clone()));
        }
        self.persist(&record)?;
        items.insert(key, record.clone());
        Ok(SaveOutcome::Created(record))
    }

    async fn get(&self, pk: &str, sk: &str) -> StorageResult<Option<PointRecord>> {
        let items = self.items.read().await;
        Ok(items.get(&ItemKey::new(pk, sk)).cloned())
    }

    async fn query_prefix(&self, pk: &str, sk_prefix: &str) -> StorageResult<Vec<PointRecord>> {
        let items = self.items.read().await;
        let start = ItemKey::new(pk, sk_prefix);

        let results: Vec<PointRecord> = items
            .range(start..)
            .take_while(|(key, _)| key.pk == pk && key.sk.starts_with(sk_prefix))
            .map(|(_, record)| record.clone())
            .collect();

        debug!(pk, prefix = sk_prefix, count = results.len(), "prefix query");
        Ok(results)
    }

    async fn query_partition(
        &self,
        pk: &str,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> StorageResult<Page> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let lower = match cursor {
            Some(c) => Bound::Excluded(c.position_in(pk)?),
            None => Bound::Included(ItemKey::new(pk, "")),
        };

        let items = self.items.read().await;

        // Take limit + 1 to detect if more pages exist
        let mut page: Vec<PointRecord> = items
            .range((lower, Bound::Unbounded))
            .take_while(|(key, _)| key.pk == pk)
            .take(limit + 1)
            .map(|(_, record)| record.clone())
            .collect();

        let has_more = page.len() > limit;
        if has_more {
            page.pop();
        }

        let next_cursor = if has_more {
            page.last().map(|record| Cursor::after(&record.key()))
        } else {
            None
        };

        Ok(Page {
            items: page,
            next_cursor,
        })
    }

    async fn update(&self, key: &ItemKey, updates: &FieldUpdates) -> StorageResult<PointRecord> {
        let mut items = self.items.write().await;
        let current = items
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.clone()))?;

        let mut merged = current.clone();
        updates.apply(&mut merged);

        self.persist(&merged)?;
        items.insert(key.clone(), merged.clone());
        debug!(pk = %key.pk, sk = %key.sk, fields = updates.len(), "updated item");
        Ok(merged)
    }

    async fn delete(&self, pk: &str, sk: &str) -> StorageResult<PointRecord> {
        let key = ItemKey::new(pk, sk);
        let mut items = self.items.write().await;
        if !items.contains_key(&key) {
            return Err(StorageError::NotFound(key));
        }
        self.unpersist(&key)?;
        let previous = items
            .remove(&key)
            .ok_or_else(|| StorageError::NotFound(key.clone()))?;
        debug!(pk, sk, "deleted item");
        Ok(previous)
    }
}

fn item_path(dir: &Path, key: &ItemKey) -> PathBuf {
    let mut hasher = blake3::Hasher::new();
    hasher.update(key.pk.as_bytes());
    hasher.update(&[0]);
    hasher.update(key.sk.as_bytes());
    let hash = hasher.finalize();
    dir.join(format!("{}.json", hex::encode(&hash.as_bytes()[..16])))
}

fn load_items(dir: &Path) -> StorageResult<BTreeMap<ItemKey, PointRecord>> {
    let mut items = BTreeMap::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<PointRecord>(&content) {
            Ok(record) => {
                items.insert(record.key(), record);
            }
            Err(e) => warn!(path = ?path, error = %e, "skipping unreadable item"),
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reliefgrid_core::{Category, GeoPoint};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn point(entity: &str) -> PointRecord {
        let location = GeoPoint::new(dec!(41.015), dec!(29.0)).unwrap();
        PointRecord::new("POINT", entity, location, Category::Food, "bread", 6).unwrap()
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let store = TableStore::in_memory();
        store.save(point("u1")).await.unwrap();

        let mut second = point("u1");
        second.description = "water".to_string();
        store.save(second).await.unwrap();

        assert_eq!(store.len().await, 1);
        let loaded = store.get("POINT", "sxk97f#u1").await.unwrap().unwrap();
        assert_eq!(loaded.description, "water");
    }

    #[tokio::test]
    async fn test_save_if_absent() {
        let store = TableStore::in_memory();
        assert!(store.save_if_absent(point("e1")).await.unwrap().created());

        let mut again = point("e1");
        again.description = "changed".to_string();
        let outcome = store.save_if_absent(again).await.unwrap();
        assert!(!outcome.created());
        assert_eq!(outcome.record().description, "bread");
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let store = TableStore::in_memory();
        let key = ItemKey::new("POINT", "nothing#here");
        let updates = FieldUpdates::new().description("x");

        assert!(matches!(
            store.update(&key, &updates).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("POINT", "nothing#here").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(store.get("POINT", "nothing#here").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prefix_stops_at_partition_and_prefix() {
        let store = TableStore::in_memory();
        store.save(point("a")).await.unwrap();
        let mut other_partition = point("b");
        other_partition.pk = "ARCHIVE".to_string();
        store.save(other_partition).await.unwrap();

        let location = GeoPoint::new(dec!(-33.8688), dec!(151.2093)).unwrap();
        let far = PointRecord::new("POINT", "c", location, Category::Other, "", 6).unwrap();
        store.save(far).await.unwrap();

        let near = store.query_prefix("POINT", "sxk").await.unwrap();
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].sk, "sxk97f#a");

        let everything = store.query_prefix("POINT", "").await.unwrap();
        assert_eq!(everything.len(), 2);
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempdir().unwrap();
        {
            let store = TableStore::open(dir.path()).await.unwrap();
            store.save(point("keep")).await.unwrap();
            store.save(point("drop")).await.unwrap();
            store.delete("POINT", "sxk97f#drop").await.unwrap();
            store
                .update(
                    &ItemKey::new("POINT", "sxk97f#keep"),
                    &FieldUpdates::new().category(Category::Shelter),
                )
                .await
                .unwrap();
        }

        let reopened = TableStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.len().await, 1);
        let kept = reopened.get("POINT", "sxk97f#keep").await.unwrap().unwrap();
        assert_eq!(kept.category, Category::Shelter);
        assert_eq!(kept.latitude, dec!(41.015));
    }

    #[tokio::test]
    async fn test_rejects_empty_key() {
        let store = TableStore::in_memory();
        let mut record = point("x");
        record.sk = String::new();
        assert!(matches!(
            store.save(record).await,
            Err(StorageError::Validation(_))
        ));
    }
}
