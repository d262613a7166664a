// Retention: time cutoff first, then the count cap (oldest-first).

use chrono::{DateTime, TimeDelta, Utc};

use crate::models::Snapshot;

pub const DEFAULT_MAX_AGE_HOURS: u32 = 48;
pub const DEFAULT_MAX_ENTRIES: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_age: TimeDelta,
    pub max_entries: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGE_HOURS, DEFAULT_MAX_ENTRIES)
    }
}

impl RetentionPolicy {
    pub fn new(max_age_hours: u32, max_entries: usize) -> Self {
        Self {
            max_age: TimeDelta::hours(max_age_hours as i64),
            max_entries,
        }
    }
}

/// How many entries an append removed, by rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub expired: usize,
    pub evicted: usize,
}

/// Drops entries older than `now - max_age`, appends `snapshot`, then removes the
/// oldest entries until at most `max_entries` remain.
///
/// The age cutoff filters the whole log, so an out-of-order expired entry is dropped
/// even when it is not at the front; the count cap only ever removes from the front.
pub fn apply_retention(
    mut log: Vec<Snapshot>,
    snapshot: Snapshot,
    now: DateTime<Utc>,
    policy: &RetentionPolicy,
) -> (Vec<Snapshot>, PruneStats) {
    let cutoff = now - policy.max_age;
    let before = log.len();
    log.retain(|s| s.timestamp >= cutoff);
    let expired = before - log.len();

    log.push(snapshot);

    let evicted = log.len().saturating_sub(policy.max_entries);
    if evicted > 0 {
        log.drain(..evicted);
    }
    (log, PruneStats { expired, evicted })
}
