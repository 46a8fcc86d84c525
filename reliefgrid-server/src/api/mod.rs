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

//! HTTP API
//!
//! Handlers translate requests into index and pipeline calls. Error kinds
//! from the library crates become status codes here and nowhere else.

pub mod emergencies;
pub mod health;
pub mod pipeline;
pub mod points;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use reliefgrid_core::ValidationError;
use reliefgrid_index::{IndexError, ProximityIndex};
use reliefgrid_ingest::{Pipeline, PipelineError, TriggerHandle};
use reliefgrid_storage::StorageError;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, warn};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub index: ProximityIndex,
    pub pipeline: Arc<Pipeline>,
    /// Absent when no background dispatcher is running
    pub trigger: Option<TriggerHandle>,
    pub page_size: usize,
    pub request_timeout: Duration,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(index: ProximityIndex, pipeline: Arc<Pipeline>) -> Self {
        Self {
            index,
            pipeline,
            trigger: None,
            page_size: reliefgrid_storage::DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(30),
            started_at: Instant::now(),
        }
    }

    pub fn with_trigger(mut self, trigger: TriggerHandle) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Run a handler body under the request deadline
    pub(crate) async fn deadline<T, F>(&self, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::RequestTimeout(format!(
                "request exceeded {}s",
                self.request_timeout.as_secs()
            ))),
        }
    }
}

/// API routes without middleware layers
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/api/v1/points",
            get(points::query_points)
                .post(points::create_point)
                .patch(points::update_point)
                .delete(points::delete_point),
        )
        .route("/api/v1/points/all", get(points::list_points))
        .route("/api/v1/emergencies", post(emergencies::submit_emergency))
        .route("/api/v1/emergencies/:id", get(emergencies::get_emergency))
        .route("/api/v1/pipeline/events", post(pipeline::receive_events))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A collaborator failed in a way worth retrying
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request timeout: {0}")]
    RequestTimeout(String),

    /// Detail is logged, never sent to the client
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::ServiceUnavailable(msg) => {
                warn!(reason = %msg, "upstream unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "An upstream service is unavailable, retry later".to_string(),
                )
            }
            ApiError::RequestTimeout(msg) => (StatusCode::REQUEST_TIMEOUT, msg),
            ApiError::Internal(msg) => {
                error!(detail = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(key) => {
                ApiError::NotFound(format!("no item with pk '{}' and sk '{}'", key.pk, key.sk))
            }
            StorageError::Validation(v) => v.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<IndexError> for ApiError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::Validation(v) => v.into(),
            IndexError::Storage(s) => s.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        if e.is_retryable() {
            return ApiError::ServiceUnavailable(e.to_string());
        }
        match e {
            PipelineError::Validation(v) => v.into(),
            PipelineError::MissingObject(key) => ApiError::NotFound(format!("object '{}'", key)),
            PipelineError::UnknownEmergency(id) => {
                ApiError::NotFound(format!("emergency '{}'", id))
            }
            PipelineError::Storage(s) => s.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
