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


//! Voice report ingestion pipeline
//!
//! ```text
//! capture ──► audios/{id}/location.json, audios/{id}/{epoch}.wav
//!                                  │ object created
//!                                  ▼
//!                      request_transcript ──► jobs/{id}/job.json
//!                                  │ transcriber writes
//!                                  ▼
//!                      transcripts/{id}/{job}.json
//!                                  │ object created
//!                                  ▼
//!                      extract ──► extractions/{id}/extraction.json
//!                                  │
//!                                  ▼
//!                      index ──► POINT / {geohash}#{id}
//! ```
//!
//! Every stage may run more than once for the same emergency. Stages look
//! for their own marker first and reuse it, and the final write is a
//! conditional create, so redelivery never produces a second point.

use crate::error::{PipelineError, PipelineResult};
use crate::extract::{ExtractionOutput, Extractor, FALLBACK_DESCRIPTION};
use crate::paths::{self, TriggerKey};
use crate::state::{IngestionState, Markers};
use crate::transcribe::{transcript_text, JobRef, Transcriber};
use reliefgrid_core::{
    decimal_json, Category, Decimal, GeoPoint, PointRecord, ValidationError, POINT_PARTITION,
    POINT_PRECISION,
};
use reliefgrid_storage::{KeyedStore, ObjectCreated, ObjectStore, SaveOutcome};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Location snapshot stored next to the recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSnapshot {
    #[serde(with = "decimal_json")]
    pub lat: Decimal,
    #[serde(with = "decimal_json")]
    pub lng: Decimal,
}

impl LocationSnapshot {
    pub fn point(&self) -> Result<GeoPoint, ValidationError> {
        GeoPoint::new(self.lat, self.lng)
    }
}

impl From<GeoPoint> for LocationSnapshot {
    fn from(point: GeoPoint) -> Self {
        Self {
            lat: point.latitude,
            lng: point.longitude,
        }
    }
}

/// Result of a capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReceipt {
    pub emergency_id: String,
    /// Key of the stored recording
    pub voice_path: String,
}

/// What handling one object-created event did
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    TranscriptRequested(JobRef),
    Indexed { record: PointRecord, created: bool },
    /// Key does not start any stage
    Ignored,
}

/// Derived progress of one emergency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyStatus {
    pub emergency_id: String,
    pub state: IngestionState,
    pub voice_path: Option<String>,
    pub job: Option<JobRef>,
    pub transcript_path: Option<String>,
    /// Sort key of the indexed point
    pub point_sk: Option<String>,
}

pub struct Pipeline {
    objects: Arc<dyn ObjectStore>,
    table: Arc<dyn KeyedStore>,
    transcriber: Arc<dyn Transcriber>,
    extractor: Arc<dyn Extractor>,
    partition: String,
    precision: usize,
    timeout: Duration,
}

impl Pipeline {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        table: Arc<dyn KeyedStore>,
        transcriber: Arc<dyn Transcriber>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            objects,
            table,
            transcriber,
            extractor,
            partition: POINT_PARTITION.to_string(),
            precision: POINT_PRECISION,
            timeout: Duration::from_secs(30),
        }
    }

    /// Target partition and geohash precision of indexed points
    pub fn with_partition(mut self, partition: impl Into<String>, precision: usize) -> Self {
        self.partition = partition.into();
        self.precision = precision;
        self
    }

    /// Deadline for each collaborator call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Stage 1: store the location snapshot, then the recording.
    pub async fn capture(&self, audio: &[u8], location: GeoPoint) -> PipelineResult<CaptureReceipt> {
        if audio.is_empty() {
            return Err(ValidationError::invalid("voice", "audio is empty").into());
        }

        let emergency_id = paths::new_emergency_id();
        let snapshot = LocationSnapshot::from(location);
        self.objects
            .put(&paths::location_key(&emergency_id), serde_json::to_vec(&snapshot)?)
            .await?;

        let voice_path = paths::audio_key(&emergency_id, chrono::Utc::now().timestamp());
        self.objects.put(&voice_path, audio.to_vec()).await?;

        info!(
            emergency_id = %emergency_id,
            voice_path = %voice_path,
            size = audio.len(),
            "captured voice report"
        );
        Ok(CaptureReceipt {
            emergency_id,
            voice_path,
        })
    }

    /// Stage 2: submit the recording for transcription.
    pub async fn request_transcript(&self, audio_key: &str) -> PipelineResult<JobRef> {
        let id = match paths::classify(audio_key) {
            Some(TriggerKey::Audio { emergency_id }) => emergency_id,
            _ => return Err(invalid_key(audio_key, "expected audios/{id}/{epoch}.wav")),
        };

        let job_key = paths::job_key(&id);
        if let Some(bytes) = self.objects.get(&job_key).await? {
            let job: JobRef = serde_json::from_slice(&bytes)?;
            debug!(emergency_id = %id, job = %job.job_name, "transcript already requested");
            return Ok(job);
        }

        let audio = self
            .objects
            .get(audio_key)
            .await?
            .ok_or_else(|| PipelineError::MissingObject(audio_key.to_string()))?;

        let job_name = format!("transcribe-job-{}", chrono::Utc::now().timestamp());
        let output_key = paths::transcript_key(&id, &job_name);
        let job = self
            .call(
                "transcription",
                self.transcriber.start(audio_key, audio, &output_key),
            )
            .await?;

        self.objects
            .put(&job_key, serde_json::to_vec_pretty(&job)?)
            .await?;
        info!(
            emergency_id = %id,
            job = %job.job_name,
            transcriber = self.transcriber.name(),
            "transcript requested"
        );
        Ok(job)
    }

    /// Stage 3: structure the transcript with the language model.
    pub async fn extract(&self, transcript_key: &str) -> PipelineResult<ExtractionOutput> {
        let id = match paths::classify(transcript_key) {
            Some(TriggerKey::Transcript { emergency_id }) => emergency_id,
            _ => return Err(invalid_key(transcript_key, "expected transcripts/{id}/{job}.json")),
        };

        let extraction_key = paths::extraction_key(&id);
        if let Some(bytes) = self.objects.get(&extraction_key).await? {
            debug!(emergency_id = %id, "reusing stored extraction");
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let bytes = self
            .objects
            .get(transcript_key)
            .await?
            .ok_or_else(|| PipelineError::MissingObject(transcript_key.to_string()))?;
        let text = transcript_text(&bytes);

        let output = if text.is_empty() {
            debug!(emergency_id = %id, "empty transcript, skipping extraction");
            ExtractionOutput::raw("")
        } else {
            let raw = self
                .call("extraction", self.extractor.extract(&text))
                .await?;
            ExtractionOutput::parse(&raw)
        };

        self.objects
            .put(&extraction_key, serde_json::to_vec_pretty(&output)?)
            .await?;
        info!(
            emergency_id = %id,
            extractor = self.extractor.name(),
            raw = output.is_raw(),
            "transcript extracted"
        );
        Ok(output)
    }

    /// Stage 4: write the point, at most once per emergency.
    pub async fn index(&self, emergency_id: &str) -> PipelineResult<SaveOutcome> {
        paths::validate_emergency_id(emergency_id)?;

        let location = self.location(emergency_id).await?;
        let extraction_key = paths::extraction_key(emergency_id);
        let bytes = self
            .objects
            .get(&extraction_key)
            .await?
            .ok_or(PipelineError::MissingObject(extraction_key))?;
        let output: ExtractionOutput = serde_json::from_slice(&bytes)?;

        let description = output
            .description()
            .unwrap_or(FALLBACK_DESCRIPTION)
            .to_string();
        let record = PointRecord::new(
            &self.partition,
            emergency_id,
            location.point()?,
            Category::Person,
            description,
            self.precision,
        )?
        .with_extra(output.into_map());

        let outcome = self.table.save_if_absent(record).await?;
        info!(
            emergency_id,
            sk = %outcome.record().sk,
            created = outcome.created(),
            "emergency indexed"
        );
        Ok(outcome)
    }

    /// Route an object-created event to the stage it starts
    pub async fn handle(&self, event: &ObjectCreated) -> PipelineResult<HandleOutcome> {
        match paths::classify(&event.key) {
            Some(TriggerKey::Audio { .. }) => {
                let job = self.request_transcript(&event.key).await?;
                Ok(HandleOutcome::TranscriptRequested(job))
            }
            Some(TriggerKey::Transcript { emergency_id }) => {
                self.extract(&event.key).await?;
                let outcome = self.index(&emergency_id).await?;
                let created = outcome.created();
                let record = match outcome {
                    SaveOutcome::Created(r) | SaveOutcome::AlreadyExists(r) => r,
                };
                Ok(HandleOutcome::Indexed { record, created })
            }
            None => {
                debug!(key = %event.key, "ignoring object");
                Ok(HandleOutcome::Ignored)
            }
        }
    }

    /// Current state derived from stored markers
    pub async fn state(&self, emergency_id: &str) -> PipelineResult<EmergencyStatus> {
        paths::validate_emergency_id(emergency_id)?;

        let voice_path = self
            .objects
            .list(&paths::audio_prefix(emergency_id))
            .await?
            .into_iter()
            .find(|key| key.ends_with(".wav"));
        let transcript_path = self
            .objects
            .list(&paths::transcript_prefix(emergency_id))
            .await?
            .into_iter()
            .find(|key| key.ends_with(".json"));
        let job = match self.objects.get(&paths::job_key(emergency_id)).await? {
            Some(bytes) => Some(serde_json::from_slice::<JobRef>(&bytes)?),
            None => None,
        };

        let location = match self.location(emergency_id).await {
            Ok(location) => Some(location),
            Err(PipelineError::MissingObject(_)) => None,
            Err(e) => return Err(e),
        };
        let point_sk = match location {
            Some(location) => {
                let geohash = location.point()?.geohash(self.precision)?;
                let sk = format!("{}#{}", geohash, emergency_id);
                self.table
                    .get(&self.partition, &sk)
                    .await?
                    .map(|record| record.sk)
            }
            None => None,
        };

        let markers = Markers {
            location: location.is_some(),
            audio: voice_path.is_some(),
            job: job.is_some(),
            transcript: transcript_path.is_some(),
            extraction: self
                .objects
                .exists(&paths::extraction_key(emergency_id))
                .await?,
            point: point_sk.is_some(),
        };
        let state = markers
            .state()
            .ok_or_else(|| PipelineError::UnknownEmergency(emergency_id.to_string()))?;

        Ok(EmergencyStatus {
            emergency_id: emergency_id.to_string(),
            state,
            voice_path,
            job,
            transcript_path,
            point_sk,
        })
    }

    async fn location(&self, emergency_id: &str) -> PipelineResult<LocationSnapshot> {
        let key = paths::location_key(emergency_id);
        let bytes = self
            .objects
            .get(&key)
            .await?
            .ok_or(PipelineError::MissingObject(key))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn call<T, F>(&self, operation: &str, fut: F) -> PipelineResult<T>
    where
        F: Future<Output = PipelineResult<T>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| PipelineError::Timeout {
                operation: operation.to_string(),
                elapsed: self.timeout,
            })?
    }
}

fn invalid_key(key: &str, reason: &str) -> PipelineError {
    ValidationError::invalid("key", format!("'{}': {}", key, reason)).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockExtractor, MockTranscriber};
    use reliefgrid_storage::{LocalObjectStore, TableStore};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    const EXTRACTION: &str =
        r#"{"description":"mother and child trapped","severity":"critical","location_description":"ground floor","floor":0}"#;

    struct Harness {
        _dir: TempDir,
        objects: Arc<LocalObjectStore>,
        table: Arc<TableStore>,
        transcriber: Arc<MockTranscriber>,
        extractor: Arc<MockExtractor>,
        pipeline: Pipeline,
    }

    fn harness(extraction: &str) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let objects = Arc::new(LocalObjectStore::new(dir.path()));
        let table = Arc::new(TableStore::in_memory());
        let transcriber = Arc::new(MockTranscriber::new(objects.clone(), "annem enkaz altında"));
        let extractor = Arc::new(MockExtractor::new(extraction));
        let pipeline = Pipeline::new(
            objects.clone(),
            table.clone(),
            transcriber.clone(),
            extractor.clone(),
        );
        Harness {
            _dir: dir,
            objects,
            table,
            transcriber,
            extractor,
            pipeline,
        }
    }

    fn istanbul() -> GeoPoint {
        GeoPoint::new(dec!(41.015), dec!(29.0)).unwrap()
    }

    #[tokio::test]
    async fn test_capture_writes_location_then_audio() {
        let h = harness(EXTRACTION);
        let receipt = h.pipeline.capture(b"RIFF....", istanbul()).await.unwrap();

        assert_eq!(receipt.emergency_id.len(), 32);
        assert!(receipt.voice_path.starts_with(&format!("audios/{}/", receipt.emergency_id)));
        assert!(receipt.voice_path.ends_with(".wav"));

        let location = h
            .objects
            .get(&paths::location_key(&receipt.emergency_id))
            .await
            .unwrap()
            .unwrap();
        let location: serde_json::Value = serde_json::from_slice(&location).unwrap();
        assert_eq!(location, serde_json::json!({"lat": 41.015, "lng": 29}));
        assert_eq!(
            h.objects.get(&receipt.voice_path).await.unwrap().unwrap(),
            b"RIFF...."
        );

        let status = h.pipeline.state(&receipt.emergency_id).await.unwrap();
        assert_eq!(status.state, IngestionState::Captured);
    }

    #[tokio::test]
    async fn test_capture_rejects_empty_audio() {
        let h = harness(EXTRACTION);
        let err = h.pipeline.capture(&[], istanbul()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(h.objects.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stages_in_order() {
        let h = harness(EXTRACTION);
        let receipt = h.pipeline.capture(b"wav", istanbul()).await.unwrap();
        let id = receipt.emergency_id.clone();

        let job = h.pipeline.request_transcript(&receipt.voice_path).await.unwrap();
        assert!(job.output_key.starts_with(&format!("transcripts/{}/transcribe-job-", id)));
        assert!(h.objects.exists(&paths::job_key(&id)).await.unwrap());

        let output = h.pipeline.extract(&job.output_key).await.unwrap();
        assert_eq!(output.description(), Some("mother and child trapped"));
        assert_eq!(h.pipeline.state(&id).await.unwrap().state, IngestionState::Extracted);

        let outcome = h.pipeline.index(&id).await.unwrap();
        assert!(outcome.created());
        let record = outcome.record();
        assert_eq!(record.sk, format!("sxk97f#{}", id));
        assert_eq!(record.category, Category::Person);
        assert_eq!(record.description, "mother and child trapped");
        assert_eq!(record.extra["severity"], "critical");
        assert_eq!(record.latitude, dec!(41.015));

        let status = h.pipeline.state(&id).await.unwrap();
        assert_eq!(status.state, IngestionState::Indexed);
        assert_eq!(status.point_sk.as_deref(), Some(record.sk.as_str()));
        assert_eq!(status.job, Some(job));
    }

    #[tokio::test]
    async fn test_repeated_stages_reuse_markers() {
        let h = harness(EXTRACTION);
        let receipt = h.pipeline.capture(b"wav", istanbul()).await.unwrap();

        let first = h.pipeline.request_transcript(&receipt.voice_path).await.unwrap();
        let second = h.pipeline.request_transcript(&receipt.voice_path).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(h.transcriber.calls(), 1);

        h.pipeline.extract(&first.output_key).await.unwrap();
        h.pipeline.extract(&first.output_key).await.unwrap();
        assert_eq!(h.extractor.calls(), 1);
    }

    #[tokio::test]
    async fn test_redelivered_transcript_event_indexes_once() {
        let h = harness(EXTRACTION);
        let receipt = h.pipeline.capture(b"wav", istanbul()).await.unwrap();
        let job = h.pipeline.request_transcript(&receipt.voice_path).await.unwrap();

        let event = ObjectCreated {
            key: job.output_key.clone(),
        };
        let first = h.pipeline.handle(&event).await.unwrap();
        let second = h.pipeline.handle(&event).await.unwrap();

        match (first, second) {
            (
                HandleOutcome::Indexed { created: true, record: a },
                HandleOutcome::Indexed { created: false, record: b },
            ) => assert_eq!(a, b),
            other => panic!("unexpected outcomes {:?}", other),
        }
        assert_eq!(h.table.query_prefix("POINT", "").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_extraction_uses_fallbacks() {
        let h = harness("Sorry, I can't help with that.");
        let receipt = h.pipeline.capture(b"wav", istanbul()).await.unwrap();
        let job = h.pipeline.request_transcript(&receipt.voice_path).await.unwrap();

        let outcome = h
            .pipeline
            .handle(&ObjectCreated { key: job.output_key })
            .await
            .unwrap();
        let HandleOutcome::Indexed { record, .. } = outcome else {
            panic!("expected a point");
        };
        assert_eq!(record.description, FALLBACK_DESCRIPTION);
        assert_eq!(record.extra["raw"], "Sorry, I can't help with that.");
    }

    #[tokio::test]
    async fn test_silent_recording_skips_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let objects = Arc::new(LocalObjectStore::new(dir.path()));
        let extractor = Arc::new(MockExtractor::new(EXTRACTION));
        let pipeline = Pipeline::new(
            objects.clone(),
            Arc::new(TableStore::in_memory()),
            Arc::new(MockTranscriber::new(objects.clone(), "  ")),
            extractor.clone(),
        );
        let receipt = pipeline.capture(b"wav", istanbul()).await.unwrap();
        let job = pipeline.request_transcript(&receipt.voice_path).await.unwrap();

        let outcome = pipeline
            .handle(&ObjectCreated { key: job.output_key })
            .await
            .unwrap();
        let HandleOutcome::Indexed { record, .. } = outcome else {
            panic!("expected a point");
        };
        assert_eq!(extractor.calls(), 0);
        assert_eq!(record.description, FALLBACK_DESCRIPTION);
        assert_eq!(record.extra["raw"], "");
        assert!(objects
            .exists(&paths::extraction_key(&receipt.emergency_id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_collaborator_failure_is_retryable_and_leaves_no_marker() {
        let dir = tempfile::tempdir().unwrap();
        let objects = Arc::new(LocalObjectStore::new(dir.path()));
        let transcriber = Arc::new(MockTranscriber::new(objects.clone(), "x").failing_first(1));
        let pipeline = Pipeline::new(
            objects.clone(),
            Arc::new(TableStore::in_memory()),
            transcriber.clone(),
            Arc::new(MockExtractor::new(EXTRACTION)),
        );
        let receipt = pipeline.capture(b"wav", istanbul()).await.unwrap();

        let err = pipeline.request_transcript(&receipt.voice_path).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!objects.exists(&paths::job_key(&receipt.emergency_id)).await.unwrap());

        pipeline.request_transcript(&receipt.voice_path).await.unwrap();
        assert_eq!(transcriber.calls(), 2);
    }

    #[tokio::test]
    async fn test_handle_ignores_unrelated_keys() {
        let h = harness(EXTRACTION);
        for key in ["audios/abc/location.json", "jobs/abc/job.json", "misc/readme.txt"] {
            let outcome = h
                .pipeline
                .handle(&ObjectCreated { key: key.to_string() })
                .await
                .unwrap();
            assert_eq!(outcome, HandleOutcome::Ignored);
        }
    }

    #[tokio::test]
    async fn test_index_without_location_is_permanent_failure() {
        let h = harness(EXTRACTION);
        let err = h.pipeline.index("deadbeef").await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingObject(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unknown_emergency_state() {
        let h = harness(EXTRACTION);
        assert!(matches!(
            h.pipeline.state("0123456789abcdef0123456789abcdef").await,
            Err(PipelineError::UnknownEmergency(_))
        ));
        assert!(matches!(
            h.pipeline.state("../etc").await,
            Err(PipelineError::Validation(_))
        ));
    }
}
