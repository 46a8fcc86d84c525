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


//! In-process collaborators for tests and offline runs

use crate::error::{PipelineError, PipelineResult};
use crate::extract::Extractor;
use crate::paths;
use crate::transcribe::{transcript_document, JobRef, Transcriber};
use async_trait::async_trait;
use reliefgrid_storage::ObjectStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Transcriber that writes a fixed transcript immediately.
///
/// The first `failures` calls fail with a retryable error.
pub struct MockTranscriber {
    objects: Arc<dyn ObjectStore>,
    text: String,
    failures: AtomicUsize,
    calls: AtomicUsize,
}

impl MockTranscriber {
    pub fn new(objects: Arc<dyn ObjectStore>, text: impl Into<String>) -> Self {
        Self {
            objects,
            text: text.into(),
            failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(self, failures: usize) -> Self {
        self.failures.store(failures, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn start(
        &self,
        audio_key: &str,
        _audio: Vec<u8>,
        output_key: &str,
    ) -> PipelineResult<JobRef> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(PipelineError::external("transcription", "mock outage"));
        }

        let job_name = paths::file_stem(output_key).to_string();
        let document = transcript_document(&job_name, &self.text);
        self.objects
            .put(output_key, serde_json::to_vec(&document)?)
            .await?;

        Ok(JobRef {
            job_name,
            audio_key: audio_key.to_string(),
            output_key: output_key.to_string(),
            submitted_at: chrono::Utc::now().timestamp(),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Extractor returning a canned response
pub struct MockExtractor {
    response: String,
    failures: AtomicUsize,
    calls: AtomicUsize,
}

impl MockExtractor {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(self, failures: usize) -> Self {
        self.failures.store(failures, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn extract(&self, _transcript: &str) -> PipelineResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(PipelineError::external("extraction", "mock outage"));
        }

        Ok(self.response.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
