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


//! Object key layout
//!
//! ```text
//! audios/{id}/location.json           location snapshot
//! audios/{id}/{epoch}.wav             recording
//! jobs/{id}/job.json                  transcription job reference
//! transcripts/{id}/{job}.json         transcript (AWS Transcribe shape)
//! extractions/{id}/extraction.json    language model output
//! ```
//!
//! The emergency id is always the second path segment.

use reliefgrid_core::ValidationError;

pub const AUDIO_ROOT: &str = "audios";
pub const JOB_ROOT: &str = "jobs";
pub const TRANSCRIPT_ROOT: &str = "transcripts";
pub const EXTRACTION_ROOT: &str = "extractions";

const LOCATION_FILE: &str = "location.json";
const JOB_FILE: &str = "job.json";
const EXTRACTION_FILE: &str = "extraction.json";

/// Object keys that start a pipeline stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerKey {
    /// `audios/{id}/*.wav`
    Audio { emergency_id: String },
    /// `transcripts/{id}/*.json`
    Transcript { emergency_id: String },
}

impl TriggerKey {
    pub fn emergency_id(&self) -> &str {
        match self {
            TriggerKey::Audio { emergency_id } | TriggerKey::Transcript { emergency_id } => {
                emergency_id
            }
        }
    }
}

/// Fresh id: UUIDv4 as 32 lowercase hex chars
pub fn new_emergency_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Ids end up in object keys and sort keys, so only `[A-Za-z0-9_-]` is allowed.
pub fn validate_emergency_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::MissingField("emergency_id".to_string()));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::invalid(
            "emergency_id",
            format!("'{}' contains unsupported characters", id),
        ));
    }
    Ok(())
}

pub fn audio_prefix(id: &str) -> String {
    format!("{}/{}/", AUDIO_ROOT, id)
}

pub fn location_key(id: &str) -> String {
    format!("{}/{}/{}", AUDIO_ROOT, id, LOCATION_FILE)
}

pub fn audio_key(id: &str, epoch: i64) -> String {
    format!("{}/{}/{}.wav", AUDIO_ROOT, id, epoch)
}

pub fn job_key(id: &str) -> String {
    format!("{}/{}/{}", JOB_ROOT, id, JOB_FILE)
}

pub fn transcript_prefix(id: &str) -> String {
    format!("{}/{}/", TRANSCRIPT_ROOT, id)
}

pub fn transcript_key(id: &str, job_name: &str) -> String {
    format!("{}/{}/{}.json", TRANSCRIPT_ROOT, id, job_name)
}

pub fn extraction_key(id: &str) -> String {
    format!("{}/{}/{}", EXTRACTION_ROOT, id, EXTRACTION_FILE)
}

/// Classify a newly created object. Keys no stage reacts to give `None`.
pub fn classify(key: &str) -> Option<TriggerKey> {
    let mut parts = key.split('/');
    let (root, id, file) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || validate_emergency_id(id).is_err() {
        return None;
    }

    let emergency_id = id.to_string();
    match root {
        AUDIO_ROOT if file.ends_with(".wav") && file.len() > 4 => {
            Some(TriggerKey::Audio { emergency_id })
        }
        TRANSCRIPT_ROOT if file.ends_with(".json") && file.len() > 5 => {
            Some(TriggerKey::Transcript { emergency_id })
        }
        _ => None,
    }
}

/// File name without extension, e.g. the job name of a transcript key
pub fn file_stem(key: &str) -> &str {
    let file = key.rsplit('/').next().unwrap_or(key);
    file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file)
}
