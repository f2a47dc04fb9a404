//! Read-out of the per-day analytics the tracker records

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::constants::keys;
use crate::schedule::parse_analytics_day_key;
use crate::store::KeyValueStore;

/// Days compared on each side of the trend
const TREND_WINDOW: usize = 7;

/// Percent change treated as no change
const STABLE_PERCENT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Trend {
    Stable(f64),
    Increasing(f64),
    Improving(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Assessment {
    /// Five or more of the last seven days under two hours
    Healthy,
    /// Five or more of the last seven days under four hours
    Moderate,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct History {
    /// Recorded non-zero days, newest first
    pub days: Vec<DaySummary>,
}

impl History {
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Self {
        let mut days: Vec<DaySummary> = store
            .get_set(keys::ANALYTICS_DATES)
            .iter()
            .filter_map(|key| {
                let date = parse_analytics_day_key(key)?;
                let seconds = u64::try_from(store.get_int(key)?).ok()?;
                (seconds > 0).then_some(DaySummary { date, seconds })
            })
            .collect();
        days.sort_by(|a, b| b.date.cmp(&a.date));
        Self { days }
    }

    pub fn average_seconds(&self) -> Option<u64> {
        average(&self.days)
    }

    /// Last seven recorded days against the seven before them
    pub fn trend(&self) -> Option<Trend> {
        let recent_len = self.days.len().min(TREND_WINDOW);
        let (recent, rest) = self.days.split_at(recent_len);
        let older = &rest[..rest.len().min(TREND_WINDOW)];
        let recent_avg = average(recent)? as f64;
        let older_avg = average(older)? as f64;

        let percent = if older_avg > 0.0 {
            (recent_avg - older_avg) * 100.0 / older_avg
        } else {
            0.0
        };
        Some(if percent.abs() < STABLE_PERCENT {
            Trend::Stable(percent)
        } else if percent > 0.0 {
            Trend::Increasing(percent)
        } else {
            Trend::Improving(percent)
        })
    }

    pub fn assessment(&self) -> Option<Assessment> {
        if self.days.is_empty() {
            return None;
        }
        let last_week = &self.days[..self.days.len().min(TREND_WINDOW)];
        let under = |hours: u64| last_week.iter().filter(|d| d.seconds < hours * 3600).count();
        Some(if under(2) >= 5 {
            Assessment::Healthy
        } else if under(4) >= 5 {
            Assessment::Moderate
        } else {
            Assessment::High
        })
    }
}

fn average(days: &[DaySummary]) -> Option<u64> {
    if days.is_empty() {
        return None;
    }
    Some(days.iter().map(|d| d.seconds).sum::<u64>() / days.len() as u64)
}

/// `Xh Ym`
pub fn format_duration(seconds: u64) -> String {
    format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Stable(p) => write!(f, "Stable ({p:.1}%)"),
            Trend::Increasing(p) => write!(f, "Increasing (+{p:.1}%)"),
            Trend::Improving(p) => write!(f, "Improving ({p:.1}%)"),
        }
    }
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Assessment::Healthy => "Healthy screen time",
            Assessment::Moderate => "Moderate screen time, room to reduce",
            Assessment::High => "High screen time",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store_with(days: &[(u32, i64)]) -> MemoryStore {
        let mut store = MemoryStore::new();
        for (day, seconds) in days {
            let key = format!("analytics_2026_06_{day:02}");
            store.set_int(&key, *seconds);
            store.insert_into_set(keys::ANALYTICS_DATES, &key);
        }
        store
    }

    #[test]
    fn test_load_skips_zero_days_and_sorts_newest_first() {
        let store = store_with(&[(1, 100), (3, 0), (2, 300)]);
        let history = History::load(&store);
        let dates: Vec<u32> = history.days.iter().map(|d| chrono::Datelike::day(&d.date)).collect();
        assert_eq!(dates, vec![2, 1]);
        assert_eq!(history.average_seconds(), Some(200));
    }

    #[test]
    fn test_trend_needs_an_older_window() {
        let store = store_with(&[(1, 3600), (2, 3600)]);
        assert_eq!(History::load(&store).trend(), None);
        assert_eq!(History::load(&MemoryStore::new()).average_seconds(), None);
    }

    #[test]
    fn test_trend_classification() {
        // Days 8..=14 recent at 2h, days 1..=7 older at 1h
        let mut days: Vec<(u32, i64)> = (1..=7).map(|d| (d, 3600)).collect();
        days.extend((8..=14).map(|d| (d, 7200)));
        let history = History::load(&store_with(&days));
        assert_eq!(history.trend(), Some(Trend::Increasing(100.0)));

        let days: Vec<(u32, i64)> = (1..=14).map(|d| (d, 3600)).collect();
        let history = History::load(&store_with(&days));
        assert_eq!(history.trend(), Some(Trend::Stable(0.0)));
    }

    #[test]
    fn test_assessment() {
        let days: Vec<(u32, i64)> = (1..=7).map(|d| (d, 3600)).collect();
        assert_eq!(History::load(&store_with(&days)).assessment(), Some(Assessment::Healthy));

        let days: Vec<(u32, i64)> = (1..=7).map(|d| (d, 3 * 3600)).collect();
        assert_eq!(History::load(&store_with(&days)).assessment(), Some(Assessment::Moderate));

        let days: Vec<(u32, i64)> = (1..=7).map(|d| (d, 6 * 3600)).collect();
        assert_eq!(History::load(&store_with(&days)).assessment(), Some(Assessment::High));
    }

    #[test]
    fn test_format() {
        assert_eq!(format_duration(3 * 3600 + 25 * 60 + 59), "3h 25m");
        assert_eq!(Trend::Increasing(12.345).to_string(), "Increasing (+12.3%)");
    }
}
