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


//! ReliefGrid Storage Layer
//!
//! Two backends sit behind traits so the index and the ingestion pipeline
//! can run against memory in tests and against disk in the server:
//!
//! - [`KeyedStore`]: single-table items keyed by `(pk, sk)` with sort-key
//!   prefix queries and cursor pagination ([`TableStore`])
//! - [`ObjectStore`]: blobs keyed by slash paths, with write notifications
//!   ([`LocalObjectStore`])
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reliefgrid_storage::{KeyedStore, TableStore};
//!
//! let table = TableStore::open("./data/table").await?;
//! let nearby = table.query_prefix("POINT", "sxk97f").await?;
//! ```

pub mod cursor;
pub mod error;
pub mod object;
pub mod table;

pub use cursor::Cursor;
pub use error::{StorageError, StorageResult};
pub use object::{LocalObjectStore, ObjectCreated, ObjectStore};
pub use table::{KeyedStore, Page, SaveOutcome, TableStore, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
