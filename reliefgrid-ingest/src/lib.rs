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


//! ReliefGrid Ingestion
//!
//! Turns a voice recording plus a location snapshot into an indexed point:
//! - **Capture**: store the location and the recording
//! - **Transcription**: hand the recording to a speech-to-text service
//! - **Extraction**: structure the transcript with a language model
//! - **Indexing**: write one `person` point per emergency
//!
//! Stages are triggered by object-created events and tolerate
//! at-least-once delivery.
//!
//! # Example
//!
//! ```rust,ignore
//! use reliefgrid_ingest::{DispatcherConfig, Pipeline, TriggerDispatcher};
//!
//! let pipeline = Arc::new(Pipeline::new(objects, table, transcriber, extractor));
//! let trigger = TriggerDispatcher::new(DispatcherConfig::default(), pipeline.clone()).spawn();
//! trigger.forward(notifications);
//!
//! let receipt = pipeline.capture(&audio, location).await?;
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod mock;
pub mod paths;
pub mod pipeline;
pub mod state;
pub mod transcribe;
pub mod trigger;

pub use config::{ExtractionConfig, PipelineConfig, TranscriptionConfig};
pub use error::{PipelineError, PipelineResult};
pub use extract::{
    AnthropicExtractor, ExtractionOutput, Extractor, Severity, UnconfiguredExtractor,
};
pub use pipeline::{CaptureReceipt, EmergencyStatus, HandleOutcome, LocationSnapshot, Pipeline};
pub use state::IngestionState;
pub use transcribe::{HttpTranscriber, JobRef, Transcriber};
pub use trigger::{DispatchStats, DispatcherConfig, TriggerDispatcher, TriggerHandle};
