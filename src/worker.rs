// Refresh cycle: collect -> append -> aggregate -> publish.
// One cycle never fails as a whole; each step logs its own errors and the next cycle starts clean.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeDelta, Utc};
use tokio::sync::{RwLock, broadcast};
use tokio::time::Instant;
use tracing::Instrument;

use crate::aggregation_engine::{AggregationEngine, GroupRollup, Rollup};
use crate::config::AppConfig;
use crate::history_repo::HistoryRepo;
use crate::history_repo::aggregation::format_value;
use crate::models::{
    DashboardUpdate, DisplayExtreme, DisplayValue, ExtremePoint, GroupSummary, LatestReading,
    ReadingStatus,
};
use crate::sensor_repo::{CollectOutcome, SensorRepo};

/// Latest published update, shared with the HTTP layer.
pub type LatestUpdate = Arc<RwLock<Option<DashboardUpdate>>>;

pub struct WorkerDeps {
    pub sensor_repo: Arc<SensorRepo>,
    pub history_repo: Arc<HistoryRepo>,
    pub tx: broadcast::Sender<DashboardUpdate>,
    pub latest: LatestUpdate,
}

pub struct RefreshWorker {
    sensor_repo: Arc<SensorRepo>,
    history_repo: Arc<HistoryRepo>,
    engine: AggregationEngine,
    tx: broadcast::Sender<DashboardUpdate>,
    latest: LatestUpdate,
    config: Arc<AppConfig>,
}

impl RefreshWorker {
    pub fn new(deps: WorkerDeps, config: Arc<AppConfig>) -> Self {
        let WorkerDeps {
            sensor_repo,
            history_repo,
            tx,
            latest,
        } = deps;
        let engine = AggregationEngine::new(
            history_repo.clone(),
            TimeDelta::hours(config.display.chart_hours as i64),
        );
        Self {
            sensor_repo,
            history_repo,
            engine,
            tx,
            latest,
            config,
        }
    }

    pub async fn run_cycle(&self) -> DashboardUpdate {
        self.run_cycle_at(Local::now()).await
    }

    /// Runs one full cycle as of `now`, publishes the result and returns it.
    ///
    /// The snapshot is stamped with `now`; the retention cutoff is evaluated at
    /// `now` plus the time collection took, i.e. when the append happens.
    pub async fn run_cycle_at(&self, now: DateTime<Local>) -> DashboardUpdate {
        let span = tracing::info_span!("cycle", at = %now.format("%H:%M:%S"));
        async move {
            let now_utc = now.with_timezone(&Utc);
            let collect_started = Instant::now();
            let outcome = self.sensor_repo.collect_at(now_utc).await;
            let appended_at = now_utc
                + TimeDelta::from_std(collect_started.elapsed()).unwrap_or(TimeDelta::zero());

            match self
                .history_repo
                .append_at(outcome.snapshot.clone(), appended_at)
                .await
            {
                Ok(appended) => {
                    if appended.recovered_from_corruption {
                        tracing::warn!(
                            operation = "append",
                            "stored history was unreadable; started a new log"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, operation = "append", "failed to persist snapshot");
                }
            }

            let rollup = match self.engine.rollup_at(&now, &self.config.groups).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, operation = "rollup", "failed to read history");
                    Rollup {
                        groups: Vec::new(),
                        retained: 0,
                    }
                }
            };

            let update = self.build_update(now_utc, &outcome, rollup);
            self.publish(update.clone()).await;

            tracing::info!(
                sensors_ok = outcome.snapshot.values.len(),
                sensors_failed = outcome.failures.len(),
                retained = update.retained_snapshots,
                subscribers = self.tx.receiver_count(),
                "refresh cycle complete"
            );
            update
        }
        .instrument(span)
        .await
    }

    async fn publish(&self, update: DashboardUpdate) {
        *self.latest.write().await = Some(update.clone());
        if self.tx.send(update).is_err() {
            tracing::debug!(
                operation = "broadcast_update",
                "No active WebSocket clients; broadcast channel has no receivers"
            );
        }
    }

    fn build_update(
        &self,
        timestamp: DateTime<Utc>,
        outcome: &CollectOutcome,
        rollup: Rollup,
    ) -> DashboardUpdate {
        let decimals = self.config.display.decimals;

        let readings = self
            .config
            .sensors
            .iter()
            .map(|(id, sensor)| {
                let status = match outcome.snapshot.value(id) {
                    Some(value) => ReadingStatus::Ok {
                        value,
                        display: format_value(value, decimals, &sensor.unit),
                    },
                    None => ReadingStatus::Failed {
                        error: outcome
                            .failure(id)
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| "no reading".into()),
                    },
                };
                LatestReading {
                    sensor_id: id.clone(),
                    label: self.config.sensor_label(id).to_string(),
                    unit: sensor.unit.clone(),
                    status,
                }
            })
            .collect();

        let groups = self
            .config
            .groups
            .iter()
            .map(|group| {
                let unit = self.config.group_unit(group);
                let rolled = rollup.groups.iter().find(|r| r.name == group.name);
                summarize_group(
                    &group.name,
                    group.display_label(),
                    unit,
                    rolled,
                    decimals,
                )
            })
            .collect();

        DashboardUpdate {
            timestamp,
            readings,
            groups,
            retained_snapshots: rollup.retained,
        }
    }
}

fn summarize_group(
    name: &str,
    label: &str,
    unit: &str,
    rolled: Option<&GroupRollup>,
    decimals: usize,
) -> GroupSummary {
    let display = |value: f64| DisplayValue {
        value,
        display: format_value(value, decimals, unit),
    };
    let extreme = |point: &ExtremePoint| DisplayExtreme {
        display: format_value(point.value, decimals, unit),
        point: point.clone(),
    };
    let extrema = rolled.and_then(|r| r.extrema.as_ref());

    GroupSummary {
        name: name.to_string(),
        label: label.to_string(),
        unit: unit.to_string(),
        current: rolled.and_then(|r| r.current).map(display),
        previous_day: rolled.and_then(|r| r.previous_day).map(display),
        max: extrema.map(|e| extreme(&e.max)),
        min: extrema.map(|e| extreme(&e.min)),
    }
}
