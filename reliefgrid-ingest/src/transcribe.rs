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


//! Speech-to-text collaborator
//!
//! A [`Transcriber`] receives the stored recording and is responsible for
//! eventually writing a transcript object at the requested output key.
//! That write is what triggers extraction.

use crate::config::TranscriptionConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::paths;
use async_trait::async_trait;
use reliefgrid_storage::ObjectStore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Reference to a submitted transcription job, persisted as the job marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRef {
    pub job_name: String,
    pub audio_key: String,
    /// Where the transcript will appear
    pub output_key: String,
    pub submitted_at: i64,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Submit `audio` (stored at `audio_key`) for transcription into `output_key`.
    async fn start(&self, audio_key: &str, audio: Vec<u8>, output_key: &str)
        -> PipelineResult<JobRef>;

    fn name(&self) -> &str;
}

/// Transcript text from a stored transcript object.
///
/// Accepts the AWS Transcribe output shape
/// (`results.transcripts[0].transcript`) and falls back to the raw bytes as
/// text. A JSON document without a transcript yields an empty string.
pub fn transcript_text(bytes: &[u8]) -> String {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(doc) => doc["results"]["transcripts"][0]["transcript"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string(),
        Err(_) => String::from_utf8_lossy(bytes).trim().to_string(),
    }
}

/// Transcript document in the AWS Transcribe output shape
pub fn transcript_document(job_name: &str, text: &str) -> Value {
    json!({
        "jobName": job_name,
        "status": "COMPLETED",
        "results": {
            "transcripts": [{ "transcript": text }]
        }
    })
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcriber backed by an OpenAI-compatible `/audio/transcriptions` API.
///
/// The call is synchronous, so the transcript object is written before
/// `start` returns.
pub struct HttpTranscriber {
    client: reqwest::Client,
    config: TranscriptionConfig,
    objects: Arc<dyn ObjectStore>,
    timeout: Duration,
}

impl HttpTranscriber {
    pub fn new(
        config: TranscriptionConfig,
        objects: Arc<dyn ObjectStore>,
        timeout: Duration,
    ) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            config,
            objects,
            timeout,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/audio/transcriptions",
            self.config.endpoint.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn start(
        &self,
        audio_key: &str,
        audio: Vec<u8>,
        output_key: &str,
    ) -> PipelineResult<JobRef> {
        let start = Instant::now();
        let job_name = paths::file_stem(output_key).to_string();
        let file_name = audio_key.rsplit('/').next().unwrap_or("audio.wav").to_string();

        let file = reqwest::multipart::Part::bytes(audio)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.config.model.clone())
            .text("language", self.config.language.clone())
            .text("response_format", "json");

        let mut request = self.client.post(self.url()).multipart(form);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let on_error = transport_error("transcription", self.timeout);
        let response = request.send().await.map_err(&on_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::external(
                "transcription",
                format!("{}: {}", status, body),
            ));
        }
        let parsed: TranscriptionResponse = response.json().await.map_err(&on_error)?;
        debug!(job = %job_name, chars = parsed.text.len(), "transcription received");

        let document = transcript_document(&job_name, &parsed.text);
        self.objects
            .put(output_key, serde_json::to_vec(&document)?)
            .await?;

        info!(
            job = %job_name,
            output_key,
            duration_ms = start.elapsed().as_millis() as u64,
            "transcription completed"
        );

        Ok(JobRef {
            job_name,
            audio_key: audio_key.to_string(),
            output_key: output_key.to_string(),
            submitted_at: chrono::Utc::now().timestamp(),
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Map a reqwest failure of `service`; client timeouts keep their deadline.
pub(crate) fn transport_error(
    service: &'static str,
    timeout: Duration,
) -> impl Fn(reqwest::Error) -> PipelineError {
    move |e| {
        if e.is_timeout() {
            PipelineError::Timeout {
                operation: service.to_string(),
                elapsed: timeout,
            }
        } else {
            PipelineError::external(service, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_aws_shape() {
        let doc = transcript_document("transcribe-job-1", " enkaz altındayım ");
        let bytes = serde_json::to_vec(&doc).unwrap();
        assert_eq!(transcript_text(&bytes), "enkaz altındayım");
    }

    #[test]
    fn test_plain_text_and_missing_fields() {
        assert_eq!(transcript_text(b"help, third floor\n"), "help, third floor");
        assert_eq!(transcript_text(br#"{"results":{"transcripts":[]}}"#), "");
        assert_eq!(transcript_text(br#"{"other":1}"#), "");
    }

    #[test]
    fn test_url_joins_endpoint() {
        let config = TranscriptionConfig {
            endpoint: "http://localhost:9000/v1/".into(),
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let objects = Arc::new(reliefgrid_storage::LocalObjectStore::new(dir.path()));
        let transcriber = HttpTranscriber::new(config, objects, Duration::from_secs(5)).unwrap();
        assert_eq!(transcriber.url(), "http://localhost:9000/v1/audio/transcriptions");
    }
}
