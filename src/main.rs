use anyhow::Result;
use soilmon::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = Arc::new(config::AppConfig::load()?);
    let (tx, _) =
        broadcast::channel::<models::DashboardUpdate>(app_config.display.broadcast_capacity);
    let latest: worker::LatestUpdate = Arc::new(RwLock::new(None));

    let store = history_repo::SqliteBlobStore::connect(&app_config.storage.path).await?;
    store.init().await?;
    let history_repo = Arc::new(history_repo::HistoryRepo::new(
        Arc::new(store),
        app_config.storage.key.clone(),
        app_config.retention.policy(),
    ));

    let source = sensor_repo::HttpSensorSource::new(Duration::from_secs(
        app_config.collector.request_timeout_secs,
    ))?;
    let sensor_repo = Arc::new(sensor_repo::SensorRepo::new(
        Arc::new(source),
        app_config.endpoints(),
    ));

    let refresh_worker = Arc::new(worker::RefreshWorker::new(
        worker::WorkerDeps {
            sensor_repo,
            history_repo: history_repo.clone(),
            tx: tx.clone(),
            latest: latest.clone(),
        },
        app_config.clone(),
    ));
    let scheduler_handle = scheduler::spawn(
        refresh_worker,
        scheduler::SchedulerConfig {
            period_minutes: app_config.schedule.period_minutes,
            run_on_start: app_config.schedule.run_on_start,
        },
    );

    let app = routes::app(tx, latest, history_repo, app_config.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        sensors = app_config.sensors.len(),
        groups = app_config.groups.len(),
        "Listening on http://{}",
        addr
    );

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            scheduler_handle.stop().await;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
