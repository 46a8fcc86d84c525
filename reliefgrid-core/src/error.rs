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

//! Validation error types
//!
//! Every variant here is a client mistake detected before any store access.

use thiserror::Error;

/// Result type for validation
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Input rejected before it reaches storage
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Required field absent from the request
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Field present but malformed
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// Category outside the closed set
    #[error("Invalid category '{value}'. Valid values: {expected}")]
    InvalidCategory { value: String, expected: String },

    /// Search radius not in `[0, precision)`
    #[error("Invalid radius {radius}: must be at least 0 and less than {precision}")]
    InvalidRadius { radius: i64, precision: usize },

    /// Geohash precision outside the supported range
    #[error("Invalid precision {precision}: must be between 1 and {max}")]
    InvalidPrecision { precision: usize, max: usize },

    #[error("Latitude {0} out of range [-90, 90]")]
    LatitudeOutOfRange(String),

    #[error("Longitude {0} out of range [-180, 180]")]
    LongitudeOutOfRange(String),

    /// Attempt to change a key or location attribute through a partial update
    #[error("Field '{0}' cannot be updated")]
    ImmutableField(String),

    /// Partial update names a field the record does not have
    #[error("Unknown field '{0}'")]
    UnknownField(String),

    /// Pagination token could not be decoded
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
