// WebSocket stream of dashboard updates

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::models::DashboardUpdate;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) async fn ws_dashboard(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        // subscribe before reading the latest value so no update falls in between
        let mut rx = state.updates_tx.subscribe();
        let initial = state.latest.read().await.clone();
        if let Err(e) = stream_dashboard(socket, &mut rx, initial).await {
            tracing::info!("Dashboard stream error: {}", e);
        }
    })
}

async fn send_json(socket: &mut WebSocket, update: &DashboardUpdate) -> anyhow::Result<bool> {
    let json = serde_json::to_string(update)?;
    let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
    Ok(matches!(r, Ok(Ok(()))))
}

async fn stream_dashboard(
    mut socket: WebSocket,
    rx: &mut broadcast::Receiver<DashboardUpdate>,
    initial: Option<DashboardUpdate>,
) -> anyhow::Result<()> {
    tracing::info!("Client connected to dashboard stream");

    if let Some(update) = initial
        && !send_json(&mut socket, &update).await?
    {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(update) => {
                        if !send_json(&mut socket, &update).await? {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket /ws/dashboard client lagged, skipped {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}
