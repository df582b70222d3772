//! Paid-user breakdowns by plan and by acquisition source.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::models::{Dataset, EventType, User, UserId};

// ── BreakdownGroup ────────────────────────────────────────────────────────────

/// One group of the plan or source comparison.
///
/// The key is the natural identifier; resolving it to a display name is a
/// presentation concern.
#[derive(Debug, Clone, Serialize)]
pub struct BreakdownGroup {
    /// `plan_id` or `source_id` of the group.
    pub group_id: i64,
    /// Distinct paid users in the group.
    pub paid_users: u64,
    /// Sum of 30-day-normalised plan prices over those users.
    pub revenue: f64,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Group paid users by their plan, sorted by revenue descending.
pub fn compute_plan_breakdown(dataset: &Dataset) -> Vec<BreakdownGroup> {
    breakdown_by(dataset, |user| user.plan_id)
}

/// Group paid users by their acquisition source, sorted by revenue
/// descending.
pub fn compute_source_breakdown(dataset: &Dataset) -> Vec<BreakdownGroup> {
    breakdown_by(dataset, |user| user.source_id)
}

// ── Internal ──────────────────────────────────────────────────────────────────

/// Shared grouping driver: `key_fn` selects the grouping id from each paid
/// user's record. Each paid user contributes their plan's normalised price
/// once; users with an unknown `plan_id` contribute 0 revenue but still
/// count.
fn breakdown_by(dataset: &Dataset, key_fn: impl Fn(&User) -> i64) -> Vec<BreakdownGroup> {
    let paid_user_ids: HashSet<UserId> = dataset
        .events
        .iter()
        .filter(|e| e.event_type == EventType::Paid)
        .map(|e| e.user_id)
        .collect();

    let mut groups: BTreeMap<i64, (u64, f64)> = BTreeMap::new();
    for user in dataset.users.iter().filter(|u| paid_user_ids.contains(&u.user_id)) {
        let revenue = dataset
            .plan(user.plan_id)
            .map(|p| p.monthly_price())
            .unwrap_or(0.0);
        let entry = groups.entry(key_fn(user)).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += revenue;
    }

    let mut result: Vec<BreakdownGroup> = groups
        .into_iter()
        .map(|(group_id, (paid_users, revenue))| BreakdownGroup {
            group_id,
            paid_users,
            revenue,
        })
        .collect();

    // Descending by revenue; the BTreeMap id order is kept for equal revenue
    // so the output is deterministic.
    result.sort_by(|a, b| b.revenue.partial_cmp(&a.revenue).unwrap_or(std::cmp::Ordering::Equal));
    result
}

// ── Tests ─────────────────────────────────────────────────────────────────────
