//! Weekly signup growth series.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::User;
use crate::time_utils::{iso_week_start, week_range};

// ── WeeklySignups ─────────────────────────────────────────────────────────────

/// One point of the weekly growth series.
#[derive(Debug, Clone, Serialize)]
pub struct WeeklySignups {
    /// Monday starting the week.
    pub week_start: NaiveDate,
    /// Users whose signup date falls in this week.
    pub signups: u64,
    /// Week-over-week change as a fraction: `(this - prev) / prev`.
    /// 0.0 for the first week and whenever the previous week had no signups.
    pub pct_change: f64,
}

// ── compute_weekly_growth ─────────────────────────────────────────────────────

/// Group users by the ISO week of their signup date.
///
/// The output covers every week of the observed range, ascending, with
/// explicit zero entries for weeks that saw no signups (no gaps), so the
/// series always sums to the total user count. Empty input yields an empty
/// series.
pub fn compute_weekly_growth(users: &[User]) -> Vec<WeeklySignups> {
    let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for user in users {
        *counts.entry(iso_week_start(user.signup_date)).or_insert(0) += 1;
    }

    let (Some(&first), Some(&last)) = (counts.keys().next(), counts.keys().next_back()) else {
        return Vec::new();
    };

    let mut series = Vec::new();
    let mut prev: Option<u64> = None;
    for week_start in week_range(first, last) {
        let signups = counts.get(&week_start).copied().unwrap_or(0);
        let pct_change = match prev {
            Some(p) if p > 0 => (signups as f64 - p as f64) / p as f64,
            _ => 0.0,
        };
        series.push(WeeklySignups {
            week_start,
            signups,
            pct_change,
        });
        prev = Some(signups);
    }
    series
}

// ── Tests ─────────────────────────────────────────────────────────────────────
