// GET handlers: version, config, dashboard, history

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::history_repo::aggregation::snapshots_since;

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SensorInfo<'a> {
    id: &'a str,
    label: &'a str,
    unit: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupInfo<'a> {
    name: &'a str,
    label: &'a str,
    sensors: &'a [String],
}

/// GET /api/config: sensors and groups, for legends and labels.
pub(super) async fn config_handler(State(state): State<AppState>) -> Response {
    let config = state.config.as_ref();
    let sensors: Vec<SensorInfo> = config
        .sensors
        .iter()
        .map(|(id, s)| SensorInfo {
            id,
            label: config.sensor_label(id),
            unit: &s.unit,
        })
        .collect();
    let groups: Vec<GroupInfo> = config
        .groups
        .iter()
        .map(|g| GroupInfo {
            name: &g.name,
            label: g.display_label(),
            sensors: &g.sensors,
        })
        .collect();
    Json(serde_json::json!({
        "sensors": sensors,
        "groups": groups,
        "periodMinutes": config.schedule.period_minutes,
        "chartHours": config.display.chart_hours,
    }))
    .into_response()
}

/// GET /api/dashboard: latest cycle result; 404 until the first cycle completes.
pub(super) async fn dashboard_handler(State(state): State<AppState>) -> Response {
    match state.latest.read().await.as_ref() {
        Some(update) => Json(update).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no refresh cycle has completed yet" })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    hours: Option<u32>,
}

/// GET /api/history?hours=N: retained snapshots from the last N hours, oldest first.
pub(super) async fn history_handler(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let max_hours = state.config.retention.window_hours;
    let hours = query
        .hours
        .unwrap_or(state.config.display.chart_hours)
        .clamp(1, max_hours);

    match state.history_repo.read_all().await {
        Ok(log) => {
            let since = Utc::now() - TimeDelta::hours(hours as i64);
            Json(snapshots_since(&log, since)).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, operation = "read_all", "history read failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "history unavailable" })),
            )
                .into_response()
        }
    }
}
