// Aggregation engine: averages and group rollups read from the history log.
// Read-only; the log is never modified here.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use tracing::instrument;

use crate::history_repo::aggregation;
use crate::history_repo::{HistoryRepo, StorageError};
use crate::models::{AggregateResult, GroupExtrema, SensorGroup, Window};

const CURRENT_WINDOW_HOURS: i64 = 24;

/// Numbers for one group, before display formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRollup {
    pub name: String,
    pub current: Option<f64>,
    pub previous_day: Option<f64>,
    pub extrema: Option<GroupExtrema>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rollup {
    pub groups: Vec<GroupRollup>,
    /// Snapshots in the log when it was read.
    pub retained: usize,
}

pub struct AggregationEngine {
    repo: Arc<HistoryRepo>,
    chart_span: TimeDelta,
}

impl AggregationEngine {
    /// `chart_span` bounds the trailing part of the log scanned for group extrema.
    pub fn new(repo: Arc<HistoryRepo>, chart_span: TimeDelta) -> Self {
        Self { repo, chart_span }
    }

    /// Per-sensor averages over `window`; `None` when the window holds no snapshot.
    #[instrument(skip(self), fields(operation = "average_over_window"))]
    pub async fn average_over_window(
        &self,
        window: &Window,
    ) -> Result<Option<AggregateResult>, StorageError> {
        let log = self.repo.read_all().await?;
        Ok(aggregation::average_over_window(&log, window))
    }

    /// `[now - 24h, now]`.
    pub fn current_day_window() -> Window {
        Self::current_day_window_at(&Local::now())
    }

    pub fn current_day_window_at<Tz: TimeZone>(now: &DateTime<Tz>) -> Window {
        Window::trailing(now, TimeDelta::hours(CURRENT_WINDOW_HOURS))
    }

    /// Yesterday 00:00:00.000 to 23:59:59.999, local time.
    pub fn previous_calendar_day_window() -> Window {
        Self::previous_calendar_day_window_at(&Local::now())
    }

    pub fn previous_calendar_day_window_at<Tz: TimeZone>(now: &DateTime<Tz>) -> Window {
        Window::previous_calendar_day(now)
    }

    pub fn group_average<S: AsRef<str>>(result: &AggregateResult, sensor_ids: &[S]) -> Option<f64> {
        aggregation::group_average(result, sensor_ids)
    }

    /// Reads the log once and computes, for every group, the current-window and
    /// previous-day averages plus the extrema over the chart span.
    #[instrument(skip(self, groups), fields(operation = "rollup", groups = groups.len()))]
    pub async fn rollup_at<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        groups: &[SensorGroup],
    ) -> Result<Rollup, StorageError> {
        let log = self.repo.read_all().await?;

        let current = aggregation::average_over_window(&log, &Self::current_day_window_at(now));
        let previous =
            aggregation::average_over_window(&log, &Self::previous_calendar_day_window_at(now));
        let chart_since: DateTime<Utc> = now.with_timezone(&Utc) - self.chart_span;
        let charted = aggregation::snapshots_since(&log, chart_since);

        let groups = groups
            .iter()
            .map(|g| GroupRollup {
                name: g.name.clone(),
                current: current
                    .as_ref()
                    .and_then(|r| aggregation::group_average(r, &g.sensors)),
                previous_day: previous
                    .as_ref()
                    .and_then(|r| aggregation::group_average(r, &g.sensors)),
                extrema: aggregation::group_extrema(&charted, &g.sensors),
            })
            .collect();

        Ok(Rollup {
            groups,
            retained: log.len(),
        })
    }
}
