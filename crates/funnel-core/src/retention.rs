//! Weekly cohort retention matrix.
//!
//! Users are bucketed by the ISO week of their signup date; each cohort row
//! tracks what fraction of its users had any activity in each subsequent
//! calendar week.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{Event, User, UserId};
use crate::time_utils::iso_week_start;

// ── CohortRow ─────────────────────────────────────────────────────────────────

/// One cohort's retention series.
///
/// `retention[k]` is the fraction of the cohort with at least one event in
/// the calendar week `k` weeks after the cohort week. The vector is
/// triangular: it stops at the data horizon, so a short vector means "not
/// yet observable", never "zero".
#[derive(Debug, Clone, Serialize)]
pub struct CohortRow {
    /// Monday starting the cohort's signup week.
    pub cohort_week: NaiveDate,
    /// Number of users who signed up in that week.
    pub size: u64,
    /// Retention fractions for offsets 0..=horizon.
    pub retention: Vec<f64>,
}

// ── compute_retention ─────────────────────────────────────────────────────────

/// Build the triangular weekly retention matrix.
///
/// The signup itself counts as week-0 activity, so `retention[0]` is 1.0
/// for every non-empty cohort. `latest` bounds the horizon (normally the
/// latest date in the snapshot); cohort weeks after `latest` cannot occur.
/// Returns rows ordered by cohort week ascending; empty input yields an
/// empty matrix.
pub fn compute_retention(users: &[User], events: &[Event], latest: DateTime<Utc>) -> Vec<CohortRow> {
    // Cohort membership keyed by week start, sorted ascending.
    let mut cohorts: BTreeMap<NaiveDate, Vec<&User>> = BTreeMap::new();
    for user in users {
        cohorts.entry(iso_week_start(user.signup_date)).or_default().push(user);
    }

    // Per-user set of active week starts, one pass over the events table.
    let mut active_weeks: HashMap<UserId, HashSet<NaiveDate>> = HashMap::new();
    for event in events {
        active_weeks
            .entry(event.user_id)
            .or_default()
            .insert(iso_week_start(event.event_date));
    }

    let latest_week = iso_week_start(latest);

    cohorts
        .into_iter()
        .map(|(cohort_week, members)| {
            let size = members.len() as u64;
            let horizon = (latest_week - cohort_week).num_days() / 7;

            let retention: Vec<f64> = (0..=horizon.max(0))
                .map(|k| {
                    if k == 0 {
                        // Signup is week-0 activity by construction.
                        return 1.0;
                    }
                    let week = cohort_week + chrono::Duration::weeks(k);
                    let active = members
                        .iter()
                        .filter(|u| {
                            active_weeks
                                .get(&u.user_id)
                                .is_some_and(|weeks| weeks.contains(&week))
                        })
                        .count();
                    active as f64 / size as f64
                })
                .collect();

            CohortRow {
                cohort_week,
                size,
                retention,
            }
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
