// HTTP + WebSocket routes for the hosting page

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::history_repo::HistoryRepo;
use crate::models::DashboardUpdate;
use crate::worker::LatestUpdate;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) updates_tx: broadcast::Sender<DashboardUpdate>,
    pub(crate) latest: LatestUpdate,
    pub(crate) history_repo: Arc<HistoryRepo>,
    pub(crate) config: Arc<AppConfig>,
}

pub fn app(
    updates_tx: broadcast::Sender<DashboardUpdate>,
    latest: LatestUpdate,
    history_repo: Arc<HistoryRepo>,
    config: Arc<AppConfig>,
) -> Router {
    let state = AppState {
        updates_tx,
        latest,
        history_repo,
        config,
    };
    Router::new()
        .route("/", get(|| async { "soilmon: soil temperature monitor" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/config", get(http::config_handler)) // GET /api/config
        .route("/api/dashboard", get(http::dashboard_handler)) // GET /api/dashboard
        .route("/api/history", get(http::history_handler)) // GET /api/history?hours=N
        .route("/ws/dashboard", get(ws::ws_dashboard)) // WS /ws/dashboard
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
