//! Daily reset arithmetic and calendar-derived store keys
//!
//! The reset instant is always computed strictly after "now". When the
//! configured time of day has already passed today it rolls forward exactly
//! one calendar day. A local time skipped by a DST transition is read with
//! the offset in force before the jump (02:30 in a 02:00 to 03:00 gap becomes
//! 03:30); a repeated local time takes its first occurrence.

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, TimeDelta, TimeZone, Timelike};
use std::time::{Duration, Instant};

use crate::constants::keys;

/// Source of wall-clock and monotonic time for the tracker
pub trait Clock: Send {
    /// Current wall-clock time with the current local UTC offset
    fn now(&self) -> DateTime<FixedOffset>;

    /// Monotonic time used for deferred callbacks
    fn instant(&self) -> Instant;

    /// Next reset instant strictly after now
    fn next_reset(&self, hour: u32, minute: u32) -> DateTime<FixedOffset> {
        next_reset_after(&self.now(), hour, minute)
    }

    /// Most recent reset instant at or before now
    fn period_start(&self, hour: u32, minute: u32) -> DateTime<FixedOffset> {
        period_start_at(&self.now(), hour, minute)
    }
}

/// System clock in the local time zone
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    // Evaluated in `Local` so days on either side of a DST change use their own offset
    fn next_reset(&self, hour: u32, minute: u32) -> DateTime<FixedOffset> {
        next_reset_after(&Local::now(), hour, minute).fixed_offset()
    }

    fn period_start(&self, hour: u32, minute: u32) -> DateTime<FixedOffset> {
        period_start_at(&Local::now(), hour, minute).fixed_offset()
    }
}

/// `hour:minute:00` on `day`, one hour later when that local time falls in a DST gap
fn local_instant<Tz: TimeZone>(tz: &Tz, day: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
    let naive = day.and_hms_opt(hour, minute, 0)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + TimeDelta::hours(1))).earliest())
}

/// First `hour:minute` instant strictly after `now`
pub fn next_reset_after<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();
    for _ in 0..3 {
        if let Some(candidate) = local_instant(&tz, day, hour, minute) {
            if candidate > *now {
                return candidate;
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    now.clone() + TimeDelta::days(1)
}

/// Last `hour:minute` instant at or before `now`
pub fn period_start_at<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();
    for _ in 0..3 {
        if let Some(candidate) = local_instant(&tz, day, hour, minute) {
            if candidate <= *now {
                return candidate;
            }
        }
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    now.clone()
}

/// Time left until `target`, zero when it already passed
pub fn delay_until<Tz: TimeZone>(now: &DateTime<Tz>, target: &DateTime<Tz>) -> Duration {
    (target.clone() - now.clone()).to_std().unwrap_or(Duration::ZERO)
}

/// The persisted "next reset" bookkeeping used by the date-change guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSchedule {
    pub next_reset_epoch_millis: i64,
}

impl ResetSchedule {
    pub fn at<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        Self {
            next_reset_epoch_millis: instant.timestamp_millis(),
        }
    }

    /// Stored value; zero or negative means "never computed"
    pub fn from_stored(value: Option<i64>) -> Option<Self> {
        value
            .filter(|millis| *millis > 0)
            .map(|next_reset_epoch_millis| Self { next_reset_epoch_millis })
    }

    pub fn is_due<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        now.timestamp_millis() >= self.next_reset_epoch_millis
    }
}

/// Counter key for the period that started at `period_start` (`screen_time_YYYY_D`)
pub fn counter_key<Tz: TimeZone>(period_start: &DateTime<Tz>) -> String {
    format!(
        "{}_{}_{}",
        keys::DAILY_COUNTER_PREFIX,
        period_start.year(),
        period_start.ordinal()
    )
}

/// Analytics key of the calendar day (`analytics_YYYY_MM_DD`)
pub fn analytics_day_key<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    format!(
        "{}_{:04}_{:02}_{:02}",
        keys::ANALYTICS_PREFIX,
        now.year(),
        now.month(),
        now.day()
    )
}

/// Hourly analytics bucket (`analytics_YYYY_MM_DD_hour_H`)
pub fn analytics_hour_key<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    format!("{}_hour_{}", analytics_day_key(now), now.hour())
}

/// Calendar day encoded in an analytics day key
pub fn parse_analytics_day_key(key: &str) -> Option<NaiveDate> {
    let rest = key.strip_prefix(keys::ANALYTICS_PREFIX)?.strip_prefix('_')?;
    let mut parts = rest.split('_');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct ManualState {
        wall: DateTime<FixedOffset>,
        instant: Instant,
    }

    /// Hand-driven clock; clones share the same time
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        state: Arc<Mutex<ManualState>>,
    }

    impl ManualClock {
        pub fn at(rfc3339: &str) -> Self {
            let wall = DateTime::parse_from_rfc3339(rfc3339).unwrap();
            Self {
                state: Arc::new(Mutex::new(ManualState {
                    wall,
                    instant: Instant::now(),
                })),
            }
        }

        /// Move wall and monotonic time together
        pub fn advance(&self, by: Duration) {
            let mut state = self.state.lock().unwrap();
            state.wall += TimeDelta::from_std(by).unwrap();
            state.instant += by;
        }

        /// Jump the wall clock only (manual time or zone change)
        pub fn set_wall(&self, rfc3339: &str) {
            self.state.lock().unwrap().wall = DateTime::parse_from_rfc3339(rfc3339).unwrap();
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<FixedOffset> {
            self.state.lock().unwrap().wall
        }

        fn instant(&self) -> Instant {
            self.state.lock().unwrap().instant
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chrono_tz::Europe::Berlin;
    use chrono_tz::Tz;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_next_reset_rolls_one_day_before_midnight() {
        let next = next_reset_after(&utc("2026-06-15T23:59:00Z"), 0, 0);
        assert_eq!(next, utc("2026-06-16T00:00:00Z"));
    }

    #[test]
    fn test_next_reset_just_after_midnight_is_next_day_not_two() {
        let next = next_reset_after(&utc("2026-06-15T00:00:01Z"), 0, 0);
        assert_eq!(next, utc("2026-06-16T00:00:00Z"));
    }

    #[test]
    fn test_next_reset_exactly_at_instant_rolls_forward() {
        let next = next_reset_after(&utc("2026-06-15T04:30:00Z"), 4, 30);
        assert_eq!(next, utc("2026-06-16T04:30:00Z"));
    }

    #[test]
    fn test_next_reset_later_today() {
        let next = next_reset_after(&utc("2026-06-15T01:00:00Z"), 4, 30);
        assert_eq!(next, utc("2026-06-15T04:30:00Z"));
    }

    #[test]
    fn test_next_reset_crosses_year_end() {
        let next = next_reset_after(&utc("2026-12-31T22:00:00Z"), 3, 0);
        assert_eq!(next, utc("2027-01-01T03:00:00Z"));
    }

    #[test]
    fn test_next_reset_keeps_offset() {
        let now = DateTime::parse_from_rfc3339("2026-06-15T23:00:00+02:00").unwrap();
        let next = next_reset_after(&now, 0, 0);
        assert_eq!(next.to_rfc3339(), "2026-06-16T00:00:00+02:00");
    }

    fn berlin(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        Berlin.with_ymd_and_hms(y, mo, d, h, mi, 0).single().unwrap()
    }

    #[test]
    fn test_next_reset_inside_spring_forward_gap() {
        // 2026-03-29 02:00 CET jumps to 03:00 CEST, so 02:30 never happens
        let now = berlin(2026, 3, 28, 23, 0);
        let next = next_reset_after(&now, 2, 30);
        assert_eq!(next.fixed_offset().to_rfc3339(), "2026-03-29T03:30:00+02:00");
        assert!(next > now);
        assert_eq!(delay_until(&now, &next), Duration::from_secs(3 * 3600 + 1800));
    }

    #[test]
    fn test_next_reset_after_the_gap_stays_strictly_ahead() {
        let next = next_reset_after(&berlin(2026, 3, 29, 3, 10), 2, 30);
        assert_eq!(next.fixed_offset().to_rfc3339(), "2026-03-29T03:30:00+02:00");

        let next = next_reset_after(&berlin(2026, 3, 29, 3, 45), 2, 30);
        assert_eq!(next.fixed_offset().to_rfc3339(), "2026-03-30T02:30:00+02:00");
    }

    #[test]
    fn test_period_start_on_gap_day() {
        let start = period_start_at(&berlin(2026, 3, 29, 12, 0), 2, 30);
        assert_eq!(start.fixed_offset().to_rfc3339(), "2026-03-29T03:30:00+02:00");
    }

    #[test]
    fn test_next_reset_in_repeated_hour_takes_first_occurrence() {
        // 2026-10-25 03:00 CEST falls back to 02:00 CET
        let next = next_reset_after(&berlin(2026, 10, 24, 23, 0), 2, 30);
        assert_eq!(next.fixed_offset().to_rfc3339(), "2026-10-25T02:30:00+02:00");
    }

    #[test]
    fn test_period_start() {
        assert_eq!(
            period_start_at(&utc("2026-06-15T03:00:00Z"), 4, 0),
            utc("2026-06-14T04:00:00Z")
        );
        assert_eq!(
            period_start_at(&utc("2026-06-15T04:00:00Z"), 4, 0),
            utc("2026-06-15T04:00:00Z")
        );
    }

    #[test]
    fn test_schedule_due() {
        let schedule = ResetSchedule::at(&utc("2026-06-16T00:00:00Z"));
        assert!(!schedule.is_due(&utc("2026-06-15T23:59:59Z")));
        assert!(schedule.is_due(&utc("2026-06-16T00:00:00Z")));
        assert_eq!(ResetSchedule::from_stored(Some(0)), None);
        assert_eq!(ResetSchedule::from_stored(None), None);
    }

    #[test]
    fn test_delay_until_never_negative() {
        let now = utc("2026-06-15T12:00:00Z");
        assert_eq!(delay_until(&now, &utc("2026-06-15T12:00:30Z")), Duration::from_secs(30));
        assert_eq!(delay_until(&now, &utc("2026-06-15T11:00:00Z")), Duration::ZERO);
    }

    #[test]
    fn test_keys() {
        let now = utc("2026-06-15T09:42:00Z");
        assert_eq!(counter_key(&now), "screen_time_2026_166");
        assert_eq!(analytics_day_key(&now), "analytics_2026_06_15");
        assert_eq!(analytics_hour_key(&now), "analytics_2026_06_15_hour_9");
        assert_eq!(
            parse_analytics_day_key("analytics_2026_06_15"),
            NaiveDate::from_ymd_opt(2026, 6, 15)
        );
        assert_eq!(parse_analytics_day_key("analytics_2026_06_15_hour_9"), None);
        assert_eq!(parse_analytics_day_key("screen_time_2026_166"), None);
    }
}
