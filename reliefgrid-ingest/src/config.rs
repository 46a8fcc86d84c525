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


//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the ingestion pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root directory of the object store (audio, transcripts, markers).
    /// Unset means `objects/` under the server data directory.
    pub object_dir: Option<PathBuf>,

    pub transcription: TranscriptionConfig,

    pub extraction: ExtractionConfig,

    /// Deadline for a single collaborator call
    pub timeout_secs: u64,

    /// Deadline for one delivery of a trigger event (all stages it runs)
    pub delivery_timeout_secs: u64,

    /// Attempts per trigger event before it is given up (including the first)
    pub max_deliveries: u32,

    /// Wait before a failed event is redelivered
    pub redelivery_backoff_ms: u64,

    /// Trigger queue capacity
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            object_dir: None,
            transcription: TranscriptionConfig::default(),
            extraction: ExtractionConfig::default(),
            timeout_secs: 30,
            delivery_timeout_secs: 120,
            max_deliveries: 3,
            redelivery_backoff_ms: 2_000,
            channel_capacity: 1_024,
        }
    }
}

impl PipelineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    pub fn redelivery_backoff(&self) -> Duration {
        Duration::from_millis(self.redelivery_backoff_ms)
    }
}

/// Speech-to-text service (OpenAI-compatible transcription API)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Base URL; `/audio/transcriptions` is appended
    pub endpoint: String,
    pub model: String,
    /// ISO-639-1 language of the recordings
    pub language: String,
    pub api_key: Option<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "whisper-1".to_string(),
            language: "tr".to_string(),
            api_key: None,
        }
    }
}

/// Language model used to structure transcripts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Base URL; `/v1/messages` is appended
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub api_key: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com".to_string(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 500,
            api_key: None,
        }
    }
}
