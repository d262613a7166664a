// Closed time interval used to select snapshots for averaging.

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// `[now - length, now]`.
    pub fn trailing<Tz: TimeZone>(now: &DateTime<Tz>, length: TimeDelta) -> Self {
        let end = now.with_timezone(&Utc);
        Self {
            start: end - length,
            end,
        }
    }

    /// Yesterday from 00:00:00.000 to 23:59:59.999, in the time zone of `now`.
    pub fn previous_calendar_day<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let today = now.date_naive();
        let yesterday = today.pred_opt().unwrap_or(today);
        let start = yesterday.and_time(chrono::NaiveTime::MIN);
        let end = start + TimeDelta::days(1) - TimeDelta::milliseconds(1);
        Self {
            start: resolve_local(&tz, start, true),
            end: resolve_local(&tz, end, false),
        }
    }

    /// Both ends inclusive.
    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        self.start <= *timestamp && *timestamp <= self.end
    }
}

/// Maps a local wall-clock time to UTC. On a DST fold, `earliest` picks the first
/// occurrence; a time inside a DST gap moves forward to the first valid instant.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime, earliest: bool) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => t.with_timezone(&Utc),
        LocalResult::Ambiguous(first, second) => {
            if earliest {
                first.with_timezone(&Utc)
            } else {
                second.with_timezone(&Utc)
            }
        }
        LocalResult::None => tz
            .from_local_datetime(&(naive + TimeDelta::hours(1)))
            .earliest()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn previous_calendar_day_uses_local_midnight() {
        let jst = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = jst.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        let w = Window::previous_calendar_day(&now);
        assert_eq!(
            w.start,
            jst.with_ymd_and_hms(2026, 10, 18, 0, 0, 0)
                .unwrap()
                .with_timezone(&Utc)
        );
        assert_eq!(w.start.to_rfc3339(), "2026-10-17T15:00:00+00:00");
        assert_eq!(w.end - w.start, TimeDelta::days(1) - TimeDelta::milliseconds(1));
    }

    #[test]
    fn previous_calendar_day_just_after_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 1).unwrap();
        let w = Window::previous_calendar_day(&now);
        assert_eq!(w.start, Utc.with_ymd_and_hms(2026, 2, 28, 0, 0, 0).unwrap());
        assert_eq!(
            w.end,
            Utc.with_ymd_and_hms(2026, 2, 28, 23, 59, 59).unwrap() + TimeDelta::milliseconds(999)
        );
    }

    #[test]
    fn contains_is_inclusive_at_both_ends() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let w = Window::new(start, end);
        assert!(w.contains(&start));
        assert!(w.contains(&end));
        assert!(!w.contains(&(start - TimeDelta::milliseconds(1))));
        assert!(!w.contains(&(end + TimeDelta::milliseconds(1))));
    }

    #[test]
    fn trailing_window_ends_at_now() {
        let now = Utc.with_ymd_and_hms(2026, 5, 5, 12, 0, 0).unwrap();
        let w = Window::trailing(&now, TimeDelta::hours(24));
        assert_eq!(w.end, now);
        assert_eq!(w.start, Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap());
    }
}
