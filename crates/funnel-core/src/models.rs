use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Integer identifier for a user.
pub type UserId = i64;
/// Integer identifier for a subscription plan.
pub type PlanId = i64;
/// Integer identifier for an acquisition source.
pub type SourceId = i64;
/// Integer identifier for an explicit cohort.
pub type CohortId = i64;

// ── EventType ─────────────────────────────────────────────────────────────────

/// A user lifecycle stage recorded in the events table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// A visit to the site before any account exists.
    Visit,
    /// Account creation.
    Signup,
    /// Trial started.
    Trial,
    /// A payment was made.
    Paid,
}

/// The ordered funnel stage sequence used for conversion measurement.
pub const FUNNEL_STAGES: [EventType; 4] = [
    EventType::Visit,
    EventType::Signup,
    EventType::Trial,
    EventType::Paid,
];

impl EventType {
    /// Lowercase wire name of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Visit => "visit",
            EventType::Signup => "signup",
            EventType::Trial => "trial",
            EventType::Paid => "paid",
        }
    }
}

impl FromStr for EventType {
    type Err = String;

    /// Parse a stage name, tolerating surrounding whitespace and any casing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "visit" => Ok(EventType::Visit),
            "signup" => Ok(EventType::Signup),
            "trial" => Ok(EventType::Trial),
            "paid" => Ok(EventType::Paid),
            other => Err(format!("unknown event type `{}`", other)),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Entities ──────────────────────────────────────────────────────────────────

/// A registered user. `signup_date` is immutable once set; a user belongs to
/// exactly one plan and one source at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    /// UTC timestamp of account creation.
    pub signup_date: DateTime<Utc>,
    pub plan_id: PlanId,
    pub source_id: SourceId,
    /// Two-letter country code, empty when unknown.
    #[serde(default)]
    pub country: String,
}

/// A subscription plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: PlanId,
    pub name: String,
    /// Price per billing period, non-negative.
    pub price: f64,
    /// Length of the billing period in days, positive.
    pub duration_days: u32,
}

impl Plan {
    /// Plan price normalised to a 30-day basis: `price * 30 / duration_days`.
    ///
    /// A zero `duration_days` (invalid, but tolerated) yields 0.0 rather than
    /// a division-by-zero infinity.
    pub fn monthly_price(&self) -> f64 {
        if self.duration_days == 0 {
            return 0.0;
        }
        self.price * 30.0 / f64::from(self.duration_days)
    }
}

/// An acquisition channel label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub source_id: SourceId,
    pub name: String,
}

/// A single lifecycle event belonging to exactly one user.
///
/// Events for a user should be non-decreasing in causal order
/// (visit ≤ signup ≤ trial ≤ paid) but the engine tolerates violations
/// rather than assuming them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub user_id: UserId,
    pub event_type: EventType,
    /// UTC timestamp of the event.
    pub event_date: DateTime<Utc>,
}

/// An explicitly named cohort with an inclusive date range.
///
/// Secondary grouping mechanism: the retention matrix derives its cohorts
/// implicitly from signup-week buckets instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cohort {
    pub cohort_id: CohortId,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Membership association between a user and an explicit cohort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCohort {
    pub user_id: UserId,
    pub cohort_id: CohortId,
}

// ── Dataset ───────────────────────────────────────────────────────────────────

/// An in-memory snapshot of the loaded tables.
///
/// Owned by the caller; the metric functions only ever borrow it and never
/// write back.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub users: Vec<User>,
    pub events: Vec<Event>,
    pub plans: Vec<Plan>,
    pub sources: Vec<Source>,
    /// Explicit cohorts, empty unless a cohorts table was provided.
    pub cohorts: Vec<Cohort>,
    /// User/cohort associations, empty unless provided.
    pub user_cohorts: Vec<UserCohort>,
}

impl Dataset {
    /// Look up a plan by id.
    pub fn plan(&self, plan_id: PlanId) -> Option<&Plan> {
        self.plans.iter().find(|p| p.plan_id == plan_id)
    }

    /// Resolve a plan id to its display name, if known.
    pub fn plan_name(&self, plan_id: PlanId) -> Option<&str> {
        self.plan(plan_id).map(|p| p.name.as_str())
    }

    /// Resolve a source id to its display name, if known.
    pub fn source_name(&self, source_id: SourceId) -> Option<&str> {
        self.sources
            .iter()
            .find(|s| s.source_id == source_id)
            .map(|s| s.name.as_str())
    }

    /// Map from user id to user, for join-style lookups.
    pub fn users_by_id(&self) -> HashMap<UserId, &User> {
        self.users.iter().map(|u| (u.user_id, u)).collect()
    }

    /// The latest timestamp present in the snapshot, across both event dates
    /// and signup dates. `None` for a fully empty dataset.
    pub fn latest_date(&self) -> Option<DateTime<Utc>> {
        let latest_event = self.events.iter().map(|e| e.event_date).max();
        let latest_signup = self.users.iter().map(|u| u.signup_date).max();
        match (latest_event, latest_signup) {
            (Some(e), Some(s)) => Some(e.max(s)),
            (Some(e), None) => Some(e),
            (None, Some(s)) => Some(s),
            (None, None) => None,
        }
    }
}

// ── MetricsContext ────────────────────────────────────────────────────────────

/// Explicit parameters for a metrics run.
///
/// Replaces any implicit dashboard session state: the engine is a pure
/// function of (tables, context).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsContext {
    /// Reference "now" for window-relative metrics such as churn.
    pub as_of: DateTime<Utc>,
    /// Length of the trailing churn reference window, in days.
    pub churn_window_days: u32,
}

impl MetricsContext {
    /// Context anchored at the current wall-clock time with the default
    /// 30-day churn window.
    pub fn now() -> Self {
        Self {
            as_of: Utc::now(),
            churn_window_days: 30,
        }
    }

    /// Start of the churn reference window: `as_of - churn_window_days`.
    pub fn churn_window_start(&self) -> DateTime<Utc> {
        self.as_of - chrono::Duration::days(i64::from(self.churn_window_days))
    }
}
