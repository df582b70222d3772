//! Chart-ready series built from a [`DashboardReport`].
//!
//! The adapter resolves plan/source ids to display labels, converts
//! fractional rates to rounded percentages, and pads the retention matrix
//! into rectangular heatmap rows. Cells a cohort has not lived long enough
//! to have are `None` (rendered as `null`), which keeps "not yet
//! observable" distinct from "0% retained".

use funnel_core::formatting::{format_currency, format_number, format_percent, rate_to_pct};
use funnel_core::models::Dataset;
use funnel_data::analysis::DashboardReport;
use serde::Serialize;

// ── Series types ──────────────────────────────────────────────────────────────

/// One bar of the funnel chart.
#[derive(Debug, Clone, Serialize)]
pub struct BarPoint {
    /// Stage label, e.g. `"signup"`.
    pub label: String,
    /// Distinct users who reached the stage.
    pub value: u64,
    /// Conversion from the previous stage, as a percentage rounded to one
    /// decimal place. Above 100 when the data is causally inconsistent.
    pub conversion_pct: f64,
}

/// The conversion funnel as a bar chart.
#[derive(Debug, Clone, Serialize)]
pub struct BarSeries {
    pub title: String,
    pub points: Vec<BarPoint>,
}

/// One point on the weekly growth line.
#[derive(Debug, Clone, Serialize)]
pub struct LinePoint {
    /// ISO date of the week's Monday, e.g. `"2025-01-06"`.
    pub date: String,
    /// Signups in that week. Gap weeks are present with value 0.
    pub value: u64,
    /// Week-over-week change as a percentage (0 when the previous week had
    /// no signups).
    pub pct_change: f64,
}

/// Weekly signup growth as a line chart.
#[derive(Debug, Clone, Serialize)]
pub struct LineSeries {
    pub title: String,
    pub points: Vec<LinePoint>,
}

/// One cohort row of the retention heatmap.
///
/// `cells[k]` is the retention percentage for week `k` after signup, or
/// `None` for weeks beyond the cohort's observation horizon.
#[derive(Debug, Clone, Serialize)]
pub struct HeatmapRow {
    /// ISO date of the cohort's signup-week Monday.
    pub cohort_week: String,
    /// Users who signed up in that week.
    pub size: u64,
    pub cells: Vec<Option<f64>>,
}

/// Headline revenue numbers, pre-formatted for display.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryCards {
    /// e.g. `"$59.98"`.
    pub mrr: String,
    /// e.g. `"$29.99"`.
    pub arpu: String,
    /// e.g. `"1,024"`.
    pub paid_users: String,
    /// e.g. `"6.9%"`.
    pub churn_rate: String,
}

/// One row of a ranked breakdown table.
#[derive(Debug, Clone, Serialize)]
pub struct RankedRow {
    /// Resolved display name, or an id-based fallback like `"plan 7"`.
    pub label: String,
    pub paid_users: u64,
    /// Monthly revenue attributed to the group.
    pub revenue: f64,
}

/// A breakdown table sorted by descending revenue.
#[derive(Debug, Clone, Serialize)]
pub struct RankedTable {
    pub title: String,
    pub rows: Vec<RankedRow>,
}

// ── DashboardView ─────────────────────────────────────────────────────────────

/// Everything a renderer needs to draw the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub summary: SummaryCards,
    pub funnel: BarSeries,
    pub growth: LineSeries,
    pub retention: Vec<HeatmapRow>,
    pub plans: RankedTable,
    pub sources: RankedTable,
    /// ISO-8601 timestamp the underlying report was generated at.
    pub generated_at: String,
}

impl DashboardView {
    /// Assemble the view from a report, resolving ids against `dataset`.
    pub fn from_report(report: &DashboardReport, dataset: &Dataset) -> Self {
        let funnel = BarSeries {
            title: "Conversion funnel".to_string(),
            points: report
                .funnel
                .iter()
                .map(|stage| BarPoint {
                    label: stage.stage.to_string(),
                    value: stage.users,
                    conversion_pct: rate_to_pct(stage.conversion_from_previous, 1),
                })
                .collect(),
        };

        let growth = LineSeries {
            title: "Weekly signups".to_string(),
            points: report
                .growth
                .iter()
                .map(|week| LinePoint {
                    date: week.week_start.format("%Y-%m-%d").to_string(),
                    value: week.signups,
                    pct_change: rate_to_pct(week.pct_change, 1),
                })
                .collect(),
        };

        // Rectangular matrix: pad each cohort out to the oldest cohort's
        // horizon with None.
        let width = report
            .retention
            .iter()
            .map(|row| row.retention.len())
            .max()
            .unwrap_or(0);
        let retention = report
            .retention
            .iter()
            .map(|row| {
                let mut cells: Vec<Option<f64>> = row
                    .retention
                    .iter()
                    .map(|&rate| Some(rate_to_pct(rate, 1)))
                    .collect();
                cells.resize(width, None);
                HeatmapRow {
                    cohort_week: row.cohort_week.format("%Y-%m-%d").to_string(),
                    size: row.size,
                    cells,
                }
            })
            .collect();

        let summary = SummaryCards {
            mrr: format_currency(report.revenue.mrr),
            arpu: format_currency(report.revenue.arpu),
            paid_users: format_number(report.revenue.paid_users as f64, 0),
            churn_rate: format_percent(report.revenue.churn_rate),
        };

        let plans = RankedTable {
            title: "Revenue by plan".to_string(),
            rows: report
                .plan_breakdown
                .iter()
                .map(|group| RankedRow {
                    label: resolve_label(dataset.plan_name(group.group_id), "plan", group.group_id),
                    paid_users: group.paid_users,
                    revenue: group.revenue,
                })
                .collect(),
        };

        let sources = RankedTable {
            title: "Revenue by source".to_string(),
            rows: report
                .source_breakdown
                .iter()
                .map(|group| RankedRow {
                    label: resolve_label(
                        dataset.source_name(group.group_id),
                        "source",
                        group.group_id,
                    ),
                    paid_users: group.paid_users,
                    revenue: group.revenue,
                })
                .collect(),
        };

        DashboardView {
            summary,
            funnel,
            growth,
            retention,
            plans,
            sources,
            generated_at: report.metadata.generated_at.clone(),
        }
    }

    /// Render the view as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Render the view as a plain-text summary for terminal output.
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        out.push_str("── Summary ──\n");
        out.push_str(&format!("  MRR:         {}\n", self.summary.mrr));
        out.push_str(&format!("  ARPU:        {}\n", self.summary.arpu));
        out.push_str(&format!("  Paid users:  {}\n", self.summary.paid_users));
        out.push_str(&format!("  Churn rate:  {}\n", self.summary.churn_rate));

        out.push_str(&format!("\n── {} ──\n", self.funnel.title));
        for point in &self.funnel.points {
            out.push_str(&format!(
                "  {:<8} {:>8}  {:>6.1}%\n",
                point.label, point.value, point.conversion_pct
            ));
        }

        out.push_str(&format!("\n── {} ──\n", self.growth.title));
        for point in &self.growth.points {
            out.push_str(&format!(
                "  {}  {:>6}  {:>+7.1}%\n",
                point.date, point.value, point.pct_change
            ));
        }

        if !self.retention.is_empty() {
            out.push_str("\n── Retention by signup week ──\n");
            for row in &self.retention {
                out.push_str(&format!("  {} ({:>4}) ", row.cohort_week, row.size));
                for cell in &row.cells {
                    match cell {
                        Some(pct) => out.push_str(&format!(" {:>5.1}%", pct)),
                        None => out.push_str("      ."),
                    }
                }
                out.push('\n');
            }
        }

        for table in [&self.plans, &self.sources] {
            out.push_str(&format!("\n── {} ──\n", table.title));
            for row in &table.rows {
                out.push_str(&format!(
                    "  {:<20} {:>6}  {}\n",
                    row.label,
                    row.paid_users,
                    format_currency(row.revenue)
                ));
            }
        }

        out
    }
}

/// Use the resolved name, or fall back to `"<kind> <id>"` for ids missing
/// from the lookup table.
fn resolve_label(name: Option<&str>, kind: &str, id: i64) -> String {
    match name {
        Some(name) => name.to_string(),
        None => format!("{kind} {id}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
