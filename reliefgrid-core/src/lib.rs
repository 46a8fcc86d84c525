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

//! ReliefGrid Core
//!
//! Spatial encoding and data contracts shared by storage, the proximity
//! index, the voice ingestion pipeline and the HTTP server.
//!
//! - [`geohash`]: deterministic coordinate → base-32 cell encoding
//! - [`point`]: the indexed report and its key scheme
//! - [`update`]: typed partial updates
//! - [`decimal_json`]: exact decimal ⇄ JSON number conversion

pub mod decimal_json;
pub mod error;
pub mod geohash;
pub mod point;
pub mod update;

pub use error::{Result, ValidationError};
pub use geohash::{
    decode_bounds, encode, encode_decimal, CellBounds, Geohash, MAX_PRECISION, POINT_PRECISION,
};
pub use point::{Category, GeoPoint, ItemKey, PointRecord, KEY_SEPARATOR, POINT_PARTITION};
pub use update::{FieldUpdate, FieldUpdates};

pub use rust_decimal::Decimal;
