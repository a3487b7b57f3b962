// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::Ordering;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use illustria_model::TimeSlot;
use illustria_query::{
    city_by_id, continent_counts, country_counts, forecast_slots, list_cities, nearest_city,
    nearest_city_planar, schema_tables, CityListRequest, QueryError, SchemaProbe,
};
use illustria_snapshot::SnapshotError;
use rusqlite::Connection;
use serde_json::json;
use tracing::error;

use crate::{ApiError, ApiErrorCode, AppState};

/// A request-terminating failure: status plus machine-readable body.
pub(crate) struct Rejection(StatusCode, ApiError);

impl Rejection {
    fn invalid_param(name: &str, value: &str) -> Self {
        Self(
            StatusCode::BAD_REQUEST,
            ApiError::new(
                ApiErrorCode::InvalidQueryParameter,
                format!("invalid query parameter: {name}"),
                json!({"parameter": name, "value": value}),
            ),
        )
    }

    fn not_found(message: &str, details: serde_json::Value) -> Self {
        Self(
            StatusCode::NOT_FOUND,
            ApiError::new(ApiErrorCode::NotFound, message, details),
        )
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<SnapshotError> for Rejection {
    fn from(err: SnapshotError) -> Self {
        error!("snapshot provisioning failed: {err}");
        match err {
            SnapshotError::Config(_) => Self(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new(ApiErrorCode::ConfigError, err.to_string(), json!({})),
            ),
            _ => Self(
                StatusCode::SERVICE_UNAVAILABLE,
                ApiError::new(ApiErrorCode::SnapshotUnavailable, err.to_string(), json!({})),
            ),
        }
    }
}

impl From<QueryError> for Rejection {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::SchemaMismatch {
                table,
                missing,
                present,
            } => Self(
                StatusCode::NOT_IMPLEMENTED,
                ApiError::new(
                    ApiErrorCode::SchemaUnsupported,
                    format!(
                        "this snapshot generation lacks columns on {table}: {}",
                        missing.join(", ")
                    ),
                    json!({
                        "table": table,
                        "missing_columns": missing,
                        "present_columns": present,
                    }),
                ),
            ),
            QueryError::Sql(detail) => {
                error!("query failed: {detail}");
                Self(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new(ApiErrorCode::Internal, "query failed", json!({})),
                )
            }
        }
    }
}

fn required<T: FromStr>(params: &HashMap<String, String>, name: &str) -> Result<T, Rejection> {
    let raw = params
        .get(name)
        .ok_or_else(|| Rejection::invalid_param(name, "<missing>"))?;
    raw.parse::<T>()
        .map_err(|_| Rejection::invalid_param(name, raw))
}

fn optional<T: FromStr>(
    params: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, Rejection> {
    match params.get(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| Rejection::invalid_param(name, raw)),
    }
}

fn optional_text(params: &HashMap<String, String>, name: &str) -> Option<String> {
    params.get(name).filter(|v| !v.is_empty()).cloned()
}

async fn open_probed(state: &AppState) -> Result<(Connection, SchemaProbe), Rejection> {
    let conn = state.snapshots.open_connection().await?;
    let probe = SchemaProbe::probe(&conn)?;
    Ok((conn, probe))
}

pub(crate) async fn health_handler(
    State(state): State<AppState>,
) -> Result<Response, Rejection> {
    // Readiness means a connection can actually be opened, which
    // provisions the snapshot on the first call.
    let _conn = state.snapshots.open_connection().await?;
    let metrics = state.snapshots.metrics();
    Ok(Json(json!({
        "ok": true,
        "snapshot": {
            "path": state.snapshots.config().snapshot_path.display().to_string(),
            "fetch_total": metrics.fetch_total.load(Ordering::Relaxed),
            "cache_hits": metrics.cache_hits.load(Ordering::Relaxed),
            "corrupt_discarded": metrics.corrupt_discarded.load(Ordering::Relaxed),
            "self_heal_total": metrics.self_heal_total.load(Ordering::Relaxed),
        },
    }))
    .into_response())
}

pub(crate) async fn schema_handler(
    State(state): State<AppState>,
) -> Result<Response, Rejection> {
    let conn = state.snapshots.open_connection().await?;
    let tables = schema_tables(&conn)?;
    Ok(Json(json!({ "tables": tables })).into_response())
}

pub(crate) async fn city_handler(
    State(state): State<AppState>,
    Path(city_id): Path<i64>,
) -> Result<Response, Rejection> {
    let (conn, probe) = open_probed(&state).await?;
    match city_by_id(&conn, &probe, city_id)? {
        Some(city) => Ok(Json(city).into_response()),
        None => Err(Rejection::not_found(
            "unknown city_id",
            json!({"city_id": city_id}),
        )),
    }
}

pub(crate) async fn nearest_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, Rejection> {
    let lat: f64 = required(&params, "lat")?;
    let lon: f64 = required(&params, "lon")?;
    let (conn, probe) = open_probed(&state).await?;
    match nearest_city(&conn, &probe, lat, lon)? {
        Some(hit) => Ok(Json(hit).into_response()),
        None => Err(Rejection::not_found("no cities with coordinates", json!({}))),
    }
}

pub(crate) async fn nearest_map_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, Rejection> {
    let x: f64 = required(&params, "x")?;
    let y: f64 = required(&params, "y")?;
    let (conn, probe) = open_probed(&state).await?;
    match nearest_city_planar(&conn, &probe, x, y)? {
        Some(city) => Ok(Json(city).into_response()),
        None => Err(Rejection::not_found(
            "no cities with projected coordinates",
            json!({}),
        )),
    }
}

pub(crate) async fn forecast_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, Rejection> {
    let city_id: i64 = required(&params, "city_id")?;
    let month: i64 = required(&params, "month")?;
    let day: i64 = required(&params, "day")?;
    let tod: i64 = optional(&params, "tod", 0)?;
    let days: i64 = optional(&params, "days", state.api.default_forecast_days)?;
    let conn = state.snapshots.open_connection().await?;
    let start = TimeSlot::new(month, day, tod);
    let rows = forecast_slots(&conn, city_id, start, days)?;
    Ok(Json(json!({
        "city_id": city_id,
        "start": start,
        "days": days,
        "rows": rows,
    }))
    .into_response())
}

pub(crate) async fn cities_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, Rejection> {
    let req = CityListRequest {
        q: optional_text(&params, "q"),
        continent: optional_text(&params, "continent"),
        country: optional_text(&params, "country"),
        limit: optional(&params, "limit", state.api.default_page_size)?,
        offset: optional(&params, "offset", 0)?,
    };
    let (conn, probe) = open_probed(&state).await?;
    let page = list_cities(&conn, &probe, &req)?;
    Ok(Json(page).into_response())
}

pub(crate) async fn continents_handler(
    State(state): State<AppState>,
) -> Result<Response, Rejection> {
    let (conn, probe) = open_probed(&state).await?;
    let rows = continent_counts(&conn, &probe)?;
    Ok(Json(json!({ "continents": rows })).into_response())
}

pub(crate) async fn countries_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, Rejection> {
    let continent = optional_text(&params, "continent");
    let (conn, probe) = open_probed(&state).await?;
    let rows = country_counts(&conn, &probe, continent.as_deref())?;
    Ok(Json(json!({ "countries": rows })).into_response())
}
