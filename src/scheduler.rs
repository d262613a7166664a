// Refresh scheduler: one cycle at startup, then on wall-clock aligned ticks.
// The first tick lands on the next minute that is a multiple of the period (local time);
// after that a fixed-period interval takes over and is never re-aligned.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Timelike};
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, info};

use crate::worker::RefreshWorker;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// One unit of scheduled work. Runs to completion once started.
#[async_trait]
pub trait Cycle: Send + Sync + 'static {
    async fn run(&self);
}

#[async_trait]
impl Cycle for RefreshWorker {
    async fn run(&self) {
        self.run_cycle().await;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub period_minutes: u32,
    pub run_on_start: bool,
}

impl SchedulerConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_minutes.max(1) as u64 * 60)
    }
}

/// Time from `now` until the next instant whose minute is a multiple of
/// `period_minutes` with zero seconds. Always positive: an instant already on the
/// boundary waits a full period.
pub fn next_aligned_delay<Tz: TimeZone>(now: &DateTime<Tz>, period_minutes: u32) -> Duration {
    let period_minutes = period_minutes.max(1);
    let period_nanos = period_minutes as i64 * 60 * NANOS_PER_SEC;

    let minutes_to_next = (period_minutes - now.minute() % period_minutes) as i64;
    // nanosecond() exceeds 1e9 only during a leap second
    let into_minute =
        now.second() as i64 * NANOS_PER_SEC + (now.nanosecond() as i64).min(NANOS_PER_SEC - 1);

    let mut delay = minutes_to_next * 60 * NANOS_PER_SEC - into_minute;
    // Unreachable while minutes_to_next >= 1 and into_minute < 60s; kept as a guard
    // so a skewed clock can never yield a zero or negative delay. Not covered by tests.
    if delay <= 0 {
        delay += period_nanos;
    }
    Duration::from_nanos(delay as u64)
}

/// Running scheduler. Stopping it cancels pending timers; a cycle already in
/// progress finishes first. Dropping the handle also stops the scheduler.
pub struct SchedulerHandle {
    shutdown_tx: oneshot::Sender<()>,
    join: tokio::task::JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.join.await {
            tracing::warn!(error = %e, "scheduler task ended abnormally");
        }
    }
}

/// Spawns the scheduler, aligning the first tick to the local wall clock.
pub fn spawn<C: Cycle>(cycle: Arc<C>, config: SchedulerConfig) -> SchedulerHandle {
    let first_delay = next_aligned_delay(&Local::now(), config.period_minutes);
    spawn_with_first_delay(cycle, config, first_delay)
}

/// Spawns the scheduler with an explicit delay before the first periodic tick.
pub fn spawn_with_first_delay<C: Cycle>(
    cycle: Arc<C>,
    config: SchedulerConfig,
    first_delay: Duration,
) -> SchedulerHandle {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let join = tokio::spawn(run(cycle, config, first_delay, shutdown_rx));
    SchedulerHandle { shutdown_tx, join }
}

async fn run<C: Cycle>(
    cycle: Arc<C>,
    config: SchedulerConfig,
    first_delay: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let period = config.period();
    let first_tick = Instant::now() + first_delay;
    info!(
        delay_secs = first_delay.as_secs(),
        period_minutes = config.period_minutes,
        "next aligned refresh scheduled"
    );

    if config.run_on_start {
        cycle.run().await;
    }

    // Each cycle runs inside this task, so cycles never overlap; ticks missed while a
    // cycle overruns are skipped rather than replayed.
    tokio::select! {
        biased;
        _ = &mut shutdown_rx => {
            debug!("Scheduler stopped before first aligned tick");
            return;
        }
        _ = sleep_until(first_tick) => {}
    }
    cycle.run().await;

    let mut tick = interval_at(first_tick + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => {
                debug!("Scheduler shutting down");
                break;
            }
            _ = tick.tick() => {
                cycle.run().await;
            }
        }
    }
}
