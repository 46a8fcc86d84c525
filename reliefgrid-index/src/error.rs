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


use reliefgrid_core::ValidationError;
use reliefgrid_storage::StorageError;
use thiserror::Error;

pub type IndexResult<T> = Result<T, IndexError>;

/// Errors for proximity index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for IndexError {
    fn from(e: StorageError) -> Self {
        match e {
            // keep request problems in one place for callers
            StorageError::Validation(v) => IndexError::Validation(v),
            other => IndexError::Storage(other),
        }
    }
}
