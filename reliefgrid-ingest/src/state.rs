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


//! Ingestion lifecycle, derived from which markers exist.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionState {
    Captured,
    TranscriptRequested,
    TranscriptReady,
    Extracted,
    Indexed,
}

impl IngestionState {
    pub fn as_str(self) -> &'static str {
        match self {
            IngestionState::Captured => "captured",
            IngestionState::TranscriptRequested => "transcript_requested",
            IngestionState::TranscriptReady => "transcript_ready",
            IngestionState::Extracted => "extracted",
            IngestionState::Indexed => "indexed",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == IngestionState::Indexed
    }
}

impl std::fmt::Display for IngestionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presence of each stage's marker for one emergency
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Markers {
    pub location: bool,
    pub audio: bool,
    pub job: bool,
    pub transcript: bool,
    pub extraction: bool,
    pub point: bool,
}

impl Markers {
    /// Furthest stage reached. Stages can complete out of order under
    /// redelivery, so the latest marker wins regardless of earlier gaps.
    /// A half-written capture (location without audio) counts as nothing.
    pub fn state(&self) -> Option<IngestionState> {
        use IngestionState::*;

        let state = if self.point {
            Indexed
        } else if self.extraction {
            Extracted
        } else if self.transcript {
            TranscriptReady
        } else if self.job {
            TranscriptRequested
        } else if self.location && self.audio {
            Captured
        } else {
            return None;
        };

        Some(state)
    }
}
