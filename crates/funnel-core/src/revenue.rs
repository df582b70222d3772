//! Revenue aggregates: MRR, ARPU and churn over the paid user base.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::{Dataset, EventType, MetricsContext, UserId};

// ── RevenueMetrics ────────────────────────────────────────────────────────────

/// Aggregate revenue figures for one snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RevenueMetrics {
    /// Distinct users with at least one `paid` event.
    pub paid_users: u64,
    /// Monthly recurring revenue: sum of 30-day-normalised plan prices over
    /// paid users.
    pub mrr: f64,
    /// MRR divided by the paid user count, 0.0 when there are none.
    pub arpu: f64,
    /// Fraction of at-risk users (first paid before the window start) with no
    /// paid event inside the window. 0.0 when nobody was at risk.
    pub churn_rate: f64,
}

// ── compute_revenue ───────────────────────────────────────────────────────────

/// Compute MRR, ARPU and churn from the loaded tables.
///
/// A paid user whose `plan_id` matches no plan contributes nothing to MRR
/// (the user still counts toward `paid_users`). An empty events table
/// yields all-zero metrics rather than an error.
pub fn compute_revenue(dataset: &Dataset, ctx: &MetricsContext) -> RevenueMetrics {
    let paid_user_ids: HashSet<UserId> = dataset
        .events
        .iter()
        .filter(|e| e.event_type == EventType::Paid)
        .map(|e| e.user_id)
        .collect();

    let paid_users = paid_user_ids.len() as u64;
    if paid_users == 0 {
        return RevenueMetrics::default();
    }

    let users_by_id = dataset.users_by_id();

    let mrr: f64 = paid_user_ids
        .iter()
        .filter_map(|id| users_by_id.get(id))
        .filter_map(|user| dataset.plan(user.plan_id))
        .map(|plan| plan.monthly_price())
        .sum();

    RevenueMetrics {
        paid_users,
        mrr,
        arpu: mrr / paid_users as f64,
        churn_rate: churn_rate(dataset, ctx, &paid_user_ids),
    }
}

/// Churn over the trailing reference window.
///
/// At-risk = users whose earliest paid event predates the window start
/// (they were paying customers when the window opened). Churned = at-risk
/// users with no paid event dated inside the window.
fn churn_rate(dataset: &Dataset, ctx: &MetricsContext, paid_user_ids: &HashSet<UserId>) -> f64 {
    let window_start = ctx.churn_window_start();

    // First and last paid event per user, one pass over the events table.
    let mut paid_spans: HashMap<UserId, (chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)> =
        HashMap::with_capacity(paid_user_ids.len());
    for event in dataset
        .events
        .iter()
        .filter(|e| e.event_type == EventType::Paid)
    {
        paid_spans
            .entry(event.user_id)
            .and_modify(|(first, last)| {
                *first = (*first).min(event.event_date);
                *last = (*last).max(event.event_date);
            })
            .or_insert((event.event_date, event.event_date));
    }

    let mut at_risk = 0u64;
    let mut churned = 0u64;
    for (first, last) in paid_spans.values() {
        if *first >= window_start {
            continue;
        }
        at_risk += 1;
        // No paid activity inside [window_start, as_of].
        if *last < window_start {
            churned += 1;
        }
    }

    if at_risk == 0 {
        0.0
    } else {
        churned as f64 / at_risk as f64
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
