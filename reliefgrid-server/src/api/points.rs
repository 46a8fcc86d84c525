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

//! Point endpoints
//!
//! - `GET    /api/v1/points?latitude&longitude&radius` proximity query
//! - `POST   /api/v1/points` create
//! - `PATCH  /api/v1/points` partial update
//! - `DELETE /api/v1/points?pk&sk` delete
//! - `GET    /api/v1/points/all?cursor&limit` paged listing

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};
use reliefgrid_core::{
    decimal_json, Category, Decimal, FieldUpdates, ItemKey, PointRecord, ValidationError,
};
use reliefgrid_index::NewPoint;
use reliefgrid_storage::Cursor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::api::{ApiError, AppState};

/// Point as returned to clients, coordinates as plain JSON numbers
#[derive(Debug, Clone, Serialize)]
pub struct PointResponse {
    pub pk: String,
    pub sk: String,
    #[serde(serialize_with = "decimal_json::serialize")]
    pub latitude: Decimal,
    #[serde(serialize_with = "decimal_json::serialize")]
    pub longitude: Decimal,
    pub category: Category,
    pub description: String,
    pub extra: Map<String, Value>,
    pub created_at: i64,
}

impl From<PointRecord> for PointResponse {
    fn from(record: PointRecord) -> Self {
        Self {
            pk: record.pk,
            sk: record.sk,
            latitude: record.latitude,
            longitude: record.longitude,
            category: record.category,
            description: record.description,
            extra: record.extra,
            created_at: record.created_at,
        }
    }
}

/// Proximity query parameters. Values stay text until parsed so that
/// `41.015` reaches the encoder as exactly `41.015`.
#[derive(Debug, Deserialize)]
pub struct NearbyParams {
    #[serde(alias = "lat")]
    pub latitude: Option<String>,
    #[serde(alias = "lng")]
    pub longitude: Option<String>,
    pub radius: Option<String>,
}

/// Manual report. The entity id is always generated server side and the
/// open attributes stay empty; both belong to the voice pipeline.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePointRequest {
    #[serde(alias = "lat", deserialize_with = "decimal_json::deserialize")]
    pub latitude: Decimal,
    #[serde(alias = "lng", deserialize_with = "decimal_json::deserialize")]
    pub longitude: Decimal,
    #[serde(alias = "type")]
    pub category: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePointRequest {
    pub pk: String,
    pub sk: String,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct KeyParams {
    pub pk: String,
    pub sk: String,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<PointResponse>,
    /// Pass back as `cursor` for the next page; absent on the last page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

fn required_decimal(field: &str, value: Option<&str>) -> Result<Decimal, ValidationError> {
    let text = value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ValidationError::MissingField(field.to_string()))?;
    decimal_json::parse(text)
        .ok_or_else(|| ValidationError::invalid(field, format!("'{}' is not a number", text)))
}

fn required_radius(value: Option<&str>) -> Result<i64, ValidationError> {
    let text = value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ValidationError::MissingField("radius".to_string()))?;
    text.trim()
        .parse()
        .map_err(|_| ValidationError::invalid("radius", format!("'{}' is not an integer", text)))
}

/// GET /api/v1/points
pub async fn query_points(
    State(state): State<AppState>,
    params: Result<Query<NearbyParams>, QueryRejection>,
) -> Result<Json<Vec<PointResponse>>, ApiError> {
    let Query(params) = params?;
    let latitude = required_decimal("latitude", params.latitude.as_deref())?;
    let longitude = required_decimal("longitude", params.longitude.as_deref())?;
    let radius = required_radius(params.radius.as_deref())?;

    let points = state
        .deadline(async {
            state
                .index
                .query(latitude, longitude, radius)
                .await
                .map_err(ApiError::from)
        })
        .await?;

    Ok(Json(points.into_iter().map(PointResponse::from).collect()))
}

/// POST /api/v1/points
pub async fn create_point(
    State(state): State<AppState>,
    payload: Result<Json<CreatePointRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PointResponse>), ApiError> {
    let Json(req) = payload?;
    let category: Category = req.category.parse()?;

    let point = NewPoint::new(req.latitude, req.longitude, category, req.description);

    let record = state
        .deadline(async {
            state
                .index
                .create_point(point)
                .await
                .map_err(ApiError::from)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// PATCH /api/v1/points
pub async fn update_point(
    State(state): State<AppState>,
    payload: Result<Json<UpdatePointRequest>, JsonRejection>,
) -> Result<Json<PointResponse>, ApiError> {
    let Json(req) = payload?;
    let updates = FieldUpdates::from_json(&req.fields)?;
    let key = ItemKey::new(req.pk, req.sk);
    debug!(pk = %key.pk, sk = %key.sk, fields = updates.len(), "updating point");

    let record = state
        .deadline(async {
            state
                .index
                .update(&key, &updates)
                .await
                .map_err(ApiError::from)
        })
        .await?;

    Ok(Json(record.into()))
}

/// DELETE /api/v1/points
pub async fn delete_point(
    State(state): State<AppState>,
    params: Result<Query<KeyParams>, QueryRejection>,
) -> Result<Json<PointResponse>, ApiError> {
    let Query(params) = params?;
    let key = ItemKey::new(params.pk, params.sk);

    let removed = state
        .deadline(async { state.index.delete(&key).await.map_err(ApiError::from) })
        .await?;

    Ok(Json(removed.into()))
}

/// GET /api/v1/points/all
pub async fn list_points(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ListResponse>, ApiError> {
    let Query(params) = params?;
    let cursor = params
        .cursor
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(Cursor::parse)
        .transpose()?;
    let limit = params.limit.unwrap_or(state.page_size);

    let page = state
        .deadline(async {
            state
                .index
                .list(cursor.as_ref(), limit)
                .await
                .map_err(ApiError::from)
        })
        .await?;

    Ok(Json(ListResponse {
        items: page.items.into_iter().map(PointResponse::from).collect(),
        next_cursor: page.next_cursor.map(|c| c.as_str().to_string()),
    }))
}
