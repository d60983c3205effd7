//! crates/bookflow_core/src/insights.rs
//!
//! Derived reading statistics: streaks, the activity heatmap and a summary.
//! Everything here is a pure function over sessions that were already fetched.
//! Only ended sessions (those with a duration) count as reading.

use chrono::{Days, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::Session;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Streak {
    /// Consecutive days up to today, or up to yesterday if nothing was read today yet.
    pub current: u32,
    pub longest: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatmapCell {
    pub date: NaiveDate,
    pub seconds: i64,
    /// Intensity bucket, 0 (nothing) to 4 (an hour or more).
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadingStats {
    pub total_sessions: usize,
    pub total_seconds: i64,
    pub average_session_seconds: f64,
    pub streak: Streak,
}

fn completed(sessions: &[Session]) -> impl Iterator<Item = (&Session, i64)> {
    sessions
        .iter()
        .filter_map(|s| s.duration.map(|d| (s, i64::from(d.max(0)))))
}

pub fn reading_streak<I>(days: I, today: NaiveDate) -> Streak
where
    I: IntoIterator<Item = NaiveDate>,
{
    let days: BTreeSet<NaiveDate> = days.into_iter().filter(|d| *d <= today).collect();

    let mut longest: u32 = 0;
    let mut run: u32 = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in &days {
        run = match previous.and_then(|p| p.succ_opt()) {
            Some(next) if next == *day => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*day);
    }

    let mut cursor = if days.contains(&today) {
        Some(today)
    } else {
        today.pred_opt()
    };
    let mut current: u32 = 0;
    while let Some(day) = cursor.filter(|d| days.contains(d)) {
        current += 1;
        cursor = day.pred_opt();
    }

    Streak { current, longest }
}

pub fn heatmap_level(seconds: i64) -> u8 {
    match seconds / 60 {
        _ if seconds <= 0 => 0,
        m if m < 15 => 1,
        m if m < 30 => 2,
        m if m < 60 => 3,
        _ => 4,
    }
}

/// One cell per day for the `days` days ending at `today`, oldest first.
pub fn heatmap(sessions: &[Session], today: NaiveDate, days: u32) -> Vec<HeatmapCell> {
    if days == 0 {
        return Vec::new();
    }
    let first = today
        .checked_sub_days(Days::new(u64::from(days - 1)))
        .unwrap_or(NaiveDate::MIN);

    let mut totals: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for (session, seconds) in completed(sessions) {
        let day = session.start_time.date_naive();
        if day >= first && day <= today {
            *totals.entry(day).or_default() += seconds;
        }
    }

    first
        .iter_days()
        .take_while(|d| *d <= today)
        .map(|date| {
            let seconds = totals.get(&date).copied().unwrap_or_default();
            HeatmapCell {
                date,
                seconds,
                level: heatmap_level(seconds),
            }
        })
        .collect()
}

pub fn reading_stats(sessions: &[Session], today: NaiveDate) -> ReadingStats {
    let mut total_sessions: usize = 0;
    let mut total_seconds: i64 = 0;
    for (_, seconds) in completed(sessions) {
        total_sessions += 1;
        total_seconds += seconds;
    }
    let average_session_seconds = if total_sessions == 0 {
        0.0
    } else {
        total_seconds as f64 / total_sessions as f64
    };
    let streak = reading_streak(
        completed(sessions).map(|(s, _)| s.start_time.date_naive()),
        today,
    );

    ReadingStats {
        total_sessions,
        total_seconds,
        average_session_seconds,
        streak,
    }
}
