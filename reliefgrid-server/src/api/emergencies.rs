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

//! Voice emergency endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reliefgrid_core::ValidationError;
use reliefgrid_ingest::{CaptureReceipt, EmergencyStatus, LocationSnapshot};
use serde::Deserialize;
use tracing::info;

use crate::api::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct EmergencyRequest {
    /// Base64 recording, optionally as a `data:` URL
    pub voice: Option<String>,
    pub location: Option<LocationSnapshot>,
}

fn decode_voice(voice: Option<&str>) -> Result<Vec<u8>, ValidationError> {
    let encoded = voice
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ValidationError::MissingField("voice".to_string()))?;
    let encoded = match encoded.split_once(";base64,") {
        Some((_, data)) => data,
        None => encoded,
    };

    let audio = STANDARD
        .decode(encoded)
        .map_err(|e| ValidationError::invalid("voice", format!("invalid base64: {}", e)))?;
    if audio.is_empty() {
        return Err(ValidationError::invalid("voice", "audio is empty"));
    }
    Ok(audio)
}

/// POST /api/v1/emergencies
pub async fn submit_emergency(
    State(state): State<AppState>,
    payload: Result<Json<EmergencyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CaptureReceipt>), ApiError> {
    let Json(req) = payload?;
    let audio = decode_voice(req.voice.as_deref())?;
    let location = req
        .location
        .ok_or_else(|| ValidationError::MissingField("location".to_string()))?
        .point()?;

    let receipt = state
        .deadline(async {
            state
                .pipeline
                .capture(&audio, location)
                .await
                .map_err(ApiError::from)
        })
        .await?;

    info!(emergency_id = %receipt.emergency_id, "emergency accepted");
    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

/// GET /api/v1/emergencies/:id
pub async fn get_emergency(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EmergencyStatus>, ApiError> {
    let status = state
        .deadline(async { state.pipeline.state(&id).await.map_err(ApiError::from) })
        .await?;
    Ok(Json(status))
}
