//! Funnel stage counts and conversion rates.

use std::collections::HashSet;

use serde::Serialize;

use crate::models::{Event, UserId, FUNNEL_STAGES};

// ── FunnelStage ───────────────────────────────────────────────────────────────

/// One row of the funnel output, in stage order.
#[derive(Debug, Clone, Serialize)]
pub struct FunnelStage {
    /// Stage name (`visit`, `signup`, `trial`, `paid`).
    pub stage: &'static str,
    /// Distinct users with at least one event of this stage.
    pub users: u64,
    /// `users / previous stage users` as a fraction. 1.0 for the first
    /// non-empty stage, 0.0 when the previous stage has no users. May exceed
    /// 1.0 when the data violates causal order; reported as-is.
    pub conversion_from_previous: f64,
    /// `users / first stage users` as a fraction, 0.0 when the first stage
    /// is empty.
    pub conversion_from_start: f64,
    /// `1 - conversion_from_previous`, clamped at 0.0 for over-unity rates.
    pub drop_off_from_previous: f64,
}

// ── compute_funnel ────────────────────────────────────────────────────────────

/// Count distinct users per funnel stage and derive conversion rates.
///
/// Each stage is counted independently: a user with a `paid` event but no
/// `trial` event still counts toward `paid`. An empty events table yields
/// four rows of zeros rather than an error.
pub fn compute_funnel(events: &[Event]) -> Vec<FunnelStage> {
    let counts: Vec<u64> = FUNNEL_STAGES
        .iter()
        .map(|stage| {
            let distinct: HashSet<UserId> = events
                .iter()
                .filter(|e| e.event_type == *stage)
                .map(|e| e.user_id)
                .collect();
            distinct.len() as u64
        })
        .collect();

    let start = counts[0];

    FUNNEL_STAGES
        .iter()
        .zip(counts.iter())
        .enumerate()
        .map(|(i, (stage, &users))| {
            let conversion_from_previous = if i == 0 {
                if users > 0 {
                    1.0
                } else {
                    0.0
                }
            } else if counts[i - 1] == 0 {
                0.0
            } else {
                users as f64 / counts[i - 1] as f64
            };

            let conversion_from_start = if start == 0 {
                0.0
            } else {
                users as f64 / start as f64
            };

            FunnelStage {
                stage: stage.as_str(),
                users,
                conversion_from_previous,
                conversion_from_start,
                drop_off_from_previous: (1.0 - conversion_from_previous).max(0.0),
            }
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
