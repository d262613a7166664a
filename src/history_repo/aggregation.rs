// Pure aggregation over the snapshot log: window averages, group rollups, extrema.
// Reading the log stays in history_repo::mod; nothing here touches storage.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::{AggregateResult, ExtremePoint, GroupExtrema, Snapshot, Window};

/// Per-sensor mean over the snapshots inside `window` (both ends inclusive).
///
/// Each sensor is divided by the number of snapshots it appears in, not by the
/// number of snapshots in the window. Returns `None` when no snapshot falls inside
/// the window.
pub fn average_over_window(log: &[Snapshot], window: &Window) -> Option<AggregateResult> {
    let mut sums: BTreeMap<&str, (f64, u32)> = BTreeMap::new();
    let mut matched = 0usize;

    for snapshot in log.iter().filter(|s| window.contains(&s.timestamp)) {
        matched += 1;
        for (id, value) in &snapshot.values {
            let entry = sums.entry(id.as_str()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }

    if matched == 0 {
        return None;
    }
    Some(
        sums.into_iter()
            .map(|(id, (sum, count))| (id.to_string(), sum / count as f64))
            .collect(),
    )
}

/// Mean of the averages in `result` for the given sensors, counting only sensors
/// that are present. `None` when none of them are.
pub fn group_average<S: AsRef<str>>(result: &AggregateResult, sensor_ids: &[S]) -> Option<f64> {
    let (total, count) = sensor_ids
        .iter()
        .filter_map(|id| result.get(id.as_ref()))
        .fold((0.0, 0u32), |(t, c), v| (t + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}

/// Snapshots strictly newer than `since`, in log order. This is the span a chart draws.
pub fn snapshots_since(log: &[Snapshot], since: DateTime<Utc>) -> Vec<Snapshot> {
    log.iter().filter(|s| s.timestamp > since).cloned().collect()
}

/// Highest and lowest reading among `sensor_ids` over `log`. The first occurrence
/// wins a tie. `None` when no member sensor has a reading.
pub fn group_extrema<S: AsRef<str>>(log: &[Snapshot], sensor_ids: &[S]) -> Option<GroupExtrema> {
    let mut max: Option<ExtremePoint> = None;
    let mut min: Option<ExtremePoint> = None;

    for id in sensor_ids {
        let id = id.as_ref();
        for snapshot in log {
            let Some(value) = snapshot.value(id) else {
                continue;
            };
            if max.as_ref().is_none_or(|m| value > m.value) {
                max = Some(point(id, snapshot, value));
            }
            if min.as_ref().is_none_or(|m| value < m.value) {
                min = Some(point(id, snapshot, value));
            }
        }
    }

    Some(GroupExtrema {
        max: max?,
        min: min?,
    })
}

fn point(sensor_id: &str, snapshot: &Snapshot, value: f64) -> ExtremePoint {
    ExtremePoint {
        sensor_id: sensor_id.to_string(),
        timestamp: snapshot.timestamp,
        value,
    }
}

/// Fixed-decimal display string, e.g. `format_value(23.456, 2, "°C") == "23.46 °C"`.
pub fn format_value(value: f64, decimals: usize, unit: &str) -> String {
    if unit.is_empty() {
        format!("{:.*}", decimals, value)
    } else {
        format!("{:.*} {}", decimals, value, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_value_rounds_to_fixed_places() {
        assert_eq!(format_value(23.456, 2, "°C"), "23.46 °C");
        assert_eq!(format_value(20.0, 2, "°C"), "20.00 °C");
        assert_eq!(format_value(55.04, 1, "%"), "55.0 %");
        assert_eq!(format_value(7.0, 0, ""), "7");
    }
}
