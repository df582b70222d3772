//! Main metrics pipeline for the funnel dashboard.
//!
//! Orchestrates loading, metric computation and metadata collection,
//! returning a [`DashboardReport`] ready for the presentation layer.

use std::path::Path;

use chrono::{DateTime, Utc};
use funnel_core::breakdown::{compute_plan_breakdown, compute_source_breakdown, BreakdownGroup};
use funnel_core::error::Result;
use funnel_core::funnel::{compute_funnel, FunnelStage};
use funnel_core::growth::{compute_weekly_growth, WeeklySignups};
use funnel_core::models::{Dataset, MetricsContext};
use funnel_core::retention::{compute_retention, CohortRow};
use funnel_core::revenue::{compute_revenue, RevenueMetrics};
use funnel_core::time_utils::TimezoneHandler;
use tracing::info;

use crate::loader::load_dataset;

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata produced alongside the metrics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReportMetadata {
    /// ISO-8601 timestamp when this report was generated.
    pub generated_at: String,
    /// Reference "now" the window-relative metrics were anchored to.
    pub as_of: DateTime<Utc>,
    /// Churn reference window length, in days.
    pub churn_window_days: u32,
    /// Users loaded into the snapshot.
    pub users_loaded: usize,
    /// Events loaded into the snapshot.
    pub events_loaded: usize,
    /// Rows skipped across all tables during the load.
    pub rows_skipped: u64,
    /// Wall-clock seconds spent reading and coercing the CSV tables.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent computing the metrics.
    pub compute_time_seconds: f64,
}

/// The complete output of one dashboard run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DashboardReport {
    /// Conversion funnel, one entry per stage in order.
    pub funnel: Vec<FunnelStage>,
    /// MRR, ARPU and churn.
    pub revenue: RevenueMetrics,
    /// Weekly cohort retention matrix, oldest cohort first.
    pub retention: Vec<CohortRow>,
    /// Weekly signup counts with week-over-week change, gap weeks included.
    pub growth: Vec<WeeklySignups>,
    /// Paid users and revenue per plan, highest revenue first.
    pub plan_breakdown: Vec<BreakdownGroup>,
    /// Paid users and revenue per acquisition source, highest revenue first.
    pub source_breakdown: Vec<BreakdownGroup>,
    /// Metadata about this run.
    pub metadata: ReportMetadata,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Compute every dashboard metric over an already-loaded snapshot.
///
/// 1. Conversion funnel over the events table.
/// 2. Revenue metrics (MRR, ARPU, churn) anchored at `ctx.as_of`.
/// 3. Weekly cohort retention, bounded by the latest date in the snapshot.
/// 4. Weekly signup growth.
/// 5. Plan and source breakdowns.
///
/// Pure with respect to the dataset: the snapshot is only borrowed.
pub fn run_dashboard(dataset: &Dataset, ctx: &MetricsContext) -> DashboardReport {
    let compute_start = std::time::Instant::now();

    let funnel = compute_funnel(&dataset.events);
    let revenue = compute_revenue(dataset, ctx);

    // An empty snapshot has no observation horizon; every sectioned metric
    // degrades to its empty shape.
    let retention = match dataset.latest_date() {
        Some(latest) => compute_retention(&dataset.users, &dataset.events, latest),
        None => Vec::new(),
    };

    let growth = compute_weekly_growth(&dataset.users);
    let plan_breakdown = compute_plan_breakdown(dataset);
    let source_breakdown = compute_source_breakdown(dataset);

    let compute_time = compute_start.elapsed().as_secs_f64();

    DashboardReport {
        funnel,
        revenue,
        retention,
        growth,
        plan_breakdown,
        source_breakdown,
        metadata: ReportMetadata {
            generated_at: Utc::now().to_rfc3339(),
            as_of: ctx.as_of,
            churn_window_days: ctx.churn_window_days,
            users_loaded: dataset.users.len(),
            events_loaded: dataset.events.len(),
            rows_skipped: 0,
            load_time_seconds: 0.0,
            compute_time_seconds: compute_time,
        },
    }
}

/// Load a data directory and run the full pipeline over it.
///
/// When `ctx` is `None` the run is anchored at the latest date present in
/// the data (falling back to wall-clock now for an empty snapshot) with the
/// default 30-day churn window, so a static dataset always produces the
/// same report.
pub fn analyze_directory(
    data_path: &Path,
    tz: &TimezoneHandler,
    ctx: Option<MetricsContext>,
) -> Result<DashboardReport> {
    let load_start = std::time::Instant::now();
    let (dataset, load_report) = load_dataset(data_path, tz)?;
    let load_time = load_start.elapsed().as_secs_f64();

    let ctx = ctx.unwrap_or_else(|| MetricsContext {
        as_of: dataset.latest_date().unwrap_or_else(Utc::now),
        churn_window_days: 30,
    });

    info!(
        "Analyzing {} users / {} events as of {}",
        dataset.users.len(),
        dataset.events.len(),
        ctx.as_of.to_rfc3339(),
    );

    let mut report = run_dashboard(&dataset, &ctx);
    report.metadata.load_time_seconds = load_time;
    report.metadata.rows_skipped = load_report.total_skipped();
    Ok(report)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_csv(dir: &Path, name: &str, lines: &[&str]) {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    /// A small launch-week dataset: 5 users signed up across two ISO weeks,
    /// all 5 visited and signed up, 3 started trials, 2 paid (users 1 and 4,
    /// both on the 29.99 Basic plan; user 1 paid twice).
    fn write_launch_dataset(dir: &Path) {
        write_csv(
            dir,
            "users.csv",
            &[
                "user_id,signup_date,plan_id,source_id,country",
                "1,2025-01-06,1,1,US",
                "2,2025-01-07,2,2,DE",
                "3,2025-01-08,3,3,US",
                "4,2025-01-13,1,1,GB",
                "5,2025-01-14,2,4,FR",
            ],
        );
        write_csv(
            dir,
            "events.csv",
            &[
                "user_id,event_type,event_date",
                "1,visit,2025-01-06",
                "2,visit,2025-01-07",
                "3,visit,2025-01-08",
                "4,visit,2025-01-13",
                "5,visit,2025-01-14",
                "1,signup,2025-01-06",
                "2,signup,2025-01-07",
                "3,signup,2025-01-08",
                "4,signup,2025-01-13",
                "5,signup,2025-01-14",
                "1,trial,2025-01-08",
                "2,trial,2025-01-09",
                "4,trial,2025-01-14",
                "1,paid,2025-01-10",
                "1,paid,2025-02-10",
                "4,paid,2025-01-20",
            ],
        );
        write_csv(
            dir,
            "plans.csv",
            &[
                "plan_id,plan_name,price,duration_days",
                "1,Basic,29.99,30",
                "2,Pro,99.00,30",
                "3,Enterprise,299.00,30",
            ],
        );
        write_csv(
            dir,
            "sources.csv",
            &[
                "source_id,source_name",
                "1,Google Ads",
                "2,Organic",
                "3,Referral",
                "4,Newsletter",
            ],
        );
    }

    fn utc() -> TimezoneHandler {
        TimezoneHandler::new("UTC")
    }

    // ── analyze_directory ─────────────────────────────────────────────────────

    #[test]
    fn test_analyze_directory_funnel_counts() {
        let dir = TempDir::new().unwrap();
        write_launch_dataset(dir.path());

        let report = analyze_directory(dir.path(), &utc(), None).unwrap();

        let users: Vec<u64> = report.funnel.iter().map(|s| s.users).collect();
        assert_eq!(users, vec![5, 5, 3, 2]);
        assert!((report.funnel[2].conversion_from_previous - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_directory_revenue() {
        let dir = TempDir::new().unwrap();
        write_launch_dataset(dir.path());

        let report = analyze_directory(dir.path(), &utc(), None).unwrap();

        // Two paid users on the 29.99 plan; repeat payments do not double
        // count.
        assert_eq!(report.revenue.paid_users, 2);
        assert!((report.revenue.mrr - 59.98).abs() < 1e-9);
        assert!((report.revenue.arpu - 29.99).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_directory_default_anchor_is_latest_date() {
        let dir = TempDir::new().unwrap();
        write_launch_dataset(dir.path());

        let report = analyze_directory(dir.path(), &utc(), None).unwrap();

        // Last event in the dataset is user 1's payment on Feb 10.
        assert_eq!(
            report.metadata.as_of,
            Utc.with_ymd_and_hms(2025, 2, 10, 0, 0, 0).unwrap()
        );
        assert_eq!(report.metadata.churn_window_days, 30);
    }

    #[test]
    fn test_analyze_directory_explicit_context() {
        let dir = TempDir::new().unwrap();
        write_launch_dataset(dir.path());

        let ctx = MetricsContext {
            as_of: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            churn_window_days: 60,
        };
        let report = analyze_directory(dir.path(), &utc(), Some(ctx)).unwrap();

        assert_eq!(
            report.metadata.as_of,
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
        );
        // Both paid users' last payments fall before April 2 (60 days before
        // June 1), so both count as churned.
        assert!((report.revenue.churn_rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_directory_retention_cohorts() {
        let dir = TempDir::new().unwrap();
        write_launch_dataset(dir.path());

        let report = analyze_directory(dir.path(), &utc(), None).unwrap();

        // Signups span the weeks of Jan 6 and Jan 13.
        assert_eq!(report.retention.len(), 2);
        assert_eq!(report.retention[0].size, 3);
        assert_eq!(report.retention[1].size, 2);
        // Week-0 retention is 1.0 by construction.
        assert!((report.retention[0].retention[0] - 1.0).abs() < 1e-9);
        // The older cohort has the longer observation horizon.
        assert!(report.retention[0].retention.len() > report.retention[1].retention.len());
    }

    #[test]
    fn test_analyze_directory_growth_includes_gap_weeks() {
        let dir = TempDir::new().unwrap();
        write_launch_dataset(dir.path());
        // Add a user far after the launch weeks to open a gap.
        write_csv(
            dir.path(),
            "users.csv",
            &[
                "user_id,signup_date,plan_id,source_id",
                "1,2025-01-06,1,1",
                "2,2025-02-10,2,2",
            ],
        );

        let report = analyze_directory(dir.path(), &utc(), None).unwrap();

        // Jan 6 through Feb 10 spans six ISO weeks; the middle four have
        // zero signups but are still present.
        assert_eq!(report.growth.len(), 6);
        assert_eq!(report.growth[0].signups, 1);
        assert!(report.growth[1..5].iter().all(|w| w.signups == 0));
        assert_eq!(report.growth[5].signups, 1);
    }

    #[test]
    fn test_analyze_directory_breakdowns() {
        let dir = TempDir::new().unwrap();
        write_launch_dataset(dir.path());

        let report = analyze_directory(dir.path(), &utc(), None).unwrap();

        // Both paid users are on plan 1 via source 1.
        assert_eq!(report.plan_breakdown.len(), 1);
        assert_eq!(report.plan_breakdown[0].group_id, 1);
        assert_eq!(report.plan_breakdown[0].paid_users, 2);
        assert!((report.plan_breakdown[0].revenue - 59.98).abs() < 1e-9);

        assert_eq!(report.source_breakdown.len(), 1);
        assert_eq!(report.source_breakdown[0].group_id, 1);
    }

    #[test]
    fn test_analyze_directory_metadata_populated() {
        let dir = TempDir::new().unwrap();
        write_launch_dataset(dir.path());

        let report = analyze_directory(dir.path(), &utc(), None).unwrap();

        assert!(!report.metadata.generated_at.is_empty());
        assert_eq!(report.metadata.users_loaded, 5);
        assert_eq!(report.metadata.events_loaded, 16);
        assert_eq!(report.metadata.rows_skipped, 0);
        assert!(report.metadata.load_time_seconds >= 0.0);
        assert!(report.metadata.compute_time_seconds >= 0.0);
    }

    #[test]
    fn test_analyze_directory_counts_skipped_rows() {
        let dir = TempDir::new().unwrap();
        write_launch_dataset(dir.path());
        write_csv(
            dir.path(),
            "events.csv",
            &[
                "user_id,event_type,event_date",
                "1,visit,2025-01-06",
                "1,refund,2025-01-07",
                "1,signup,not-a-date",
            ],
        );

        let report = analyze_directory(dir.path(), &utc(), None).unwrap();
        assert_eq!(report.metadata.events_loaded, 1);
        assert_eq!(report.metadata.rows_skipped, 2);
    }

    // ── run_dashboard ─────────────────────────────────────────────────────────

    #[test]
    fn test_run_dashboard_empty_dataset() {
        let report = run_dashboard(&Dataset::default(), &MetricsContext::now());

        assert!(report.funnel.iter().all(|s| s.users == 0));
        assert_eq!(report.revenue.paid_users, 0);
        assert_eq!(report.revenue.mrr, 0.0);
        assert!(report.retention.is_empty());
        assert!(report.growth.is_empty());
        assert!(report.plan_breakdown.is_empty());
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = run_dashboard(&Dataset::default(), &MetricsContext::now());
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("funnel").is_some());
        assert!(json.get("revenue").is_some());
        assert!(json.get("metadata").is_some());
    }
}
