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


//! Ingestion error types

use reliefgrid_core::ValidationError;
use reliefgrid_storage::StorageError;
use std::time::Duration;
use thiserror::Error;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while driving a report through the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad input (empty audio, malformed key, out-of-range location)
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Object an earlier stage should have written is absent
    #[error("Missing object: {0}")]
    MissingObject(String),

    /// No marker of any stage exists for this id
    #[error("Unknown emergency: {0}")]
    UnknownEmergency(String),

    /// Transcription or extraction service failed
    #[error("{service} error: {message}")]
    External { service: String, message: String },

    /// Collaborator or delivery exceeded its deadline
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: String,
        elapsed: Duration,
    },

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Pipeline error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::External {
            service: service.into(),
            message: message.into(),
        }
    }

    /// True when redelivering the same event may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::External { .. } | PipelineError::Timeout { .. } => true,
            PipelineError::Storage(StorageError::Io(_)) => true,
            _ => false,
        }
    }
}

impl From<StorageError> for PipelineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Validation(v) => PipelineError::Validation(v),
            other => PipelineError::Storage(other),
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Serialization(e.to_string())
    }
}
