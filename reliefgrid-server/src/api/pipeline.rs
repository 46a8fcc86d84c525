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

//! Bucket notification endpoint
//!
//! Accepts the S3 event shape (`{"Records":[{"s3":{"object":{"key":..}}}]}`)
//! so an external object store can drive the pipeline. Any retryable failure
//! turns the whole response into a 503, which makes the sender redeliver;
//! stages are idempotent, so records that already succeeded are safe to
//! replay.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use reliefgrid_ingest::HandleOutcome;
use reliefgrid_storage::ObjectCreated;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct BucketNotification {
    #[serde(rename = "Records", default)]
    pub records: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub object: S3Object,
}

#[derive(Debug, Deserialize)]
pub struct S3Object {
    pub key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RecordOutcome {
    TranscriptRequested { key: String, job_name: String },
    Indexed { key: String, sk: String, created: bool },
    Ignored { key: String },
    Failed { key: String, error: String, retryable: bool },
}

impl RecordOutcome {
    fn is_retryable_failure(&self) -> bool {
        matches!(self, RecordOutcome::Failed { retryable: true, .. })
    }
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub results: Vec<RecordOutcome>,
}

/// POST /api/v1/pipeline/events
pub async fn receive_events(
    State(state): State<AppState>,
    payload: Result<Json<BucketNotification>, JsonRejection>,
) -> Result<(StatusCode, Json<EventsResponse>), ApiError> {
    let Json(notification) = payload?;

    let mut results = Vec::with_capacity(notification.records.len());
    for record in notification.records {
        let event = ObjectCreated {
            key: record.s3.object.key,
        };
        let outcome = match state.pipeline.handle(&event).await {
            Ok(HandleOutcome::TranscriptRequested(job)) => RecordOutcome::TranscriptRequested {
                key: event.key,
                job_name: job.job_name,
            },
            Ok(HandleOutcome::Indexed { record, created }) => RecordOutcome::Indexed {
                key: event.key,
                sk: record.sk,
                created,
            },
            Ok(HandleOutcome::Ignored) => RecordOutcome::Ignored { key: event.key },
            Err(e) => {
                warn!(key = %event.key, error = %e, retryable = e.is_retryable(), "event failed");
                RecordOutcome::Failed {
                    key: event.key,
                    retryable: e.is_retryable(),
                    error: e.to_string(),
                }
            }
        };
        results.push(outcome);
    }

    let status = if results.iter().any(RecordOutcome::is_retryable_failure) {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    info!(records = results.len(), status = status.as_u16(), "handled bucket notification");

    Ok((status, Json(EventsResponse { results })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_s3_event_shape() {
        let body = r#"{
            "Records": [
                {"eventName": "ObjectCreated:Put",
                 "s3": {"bucket": {"name": "deprem-veri"},
                        "object": {"key": "audios/e1/1700000000.wav", "size": 4}}}
            ]
        }"#;
        let parsed: BucketNotification = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].s3.object.key, "audios/e1/1700000000.wav");

        let empty: BucketNotification = serde_json::from_str("{}").unwrap();
        assert!(empty.records.is_empty());
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(RecordOutcome::Failed {
            key: "transcripts/e1/j.json".to_string(),
            error: "boom".to_string(),
            retryable: true,
        })
        .unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["retryable"], true);
    }
}
