mod bootstrap;

use anyhow::{bail, Result};
use chrono::Utc;
use funnel_core::error::DashboardError;
use funnel_core::models::MetricsContext;
use funnel_core::settings::Settings;
use funnel_core::time_utils::TimezoneHandler;
use funnel_data::analysis::run_dashboard;
use funnel_data::loader::load_dataset;
use funnel_series::DashboardView;

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("Funnelboard v{} starting", env!("CARGO_PKG_VERSION"));

    if settings.clear {
        tracing::info!("Saved parameters cleared");
    }

    let tz = TimezoneHandler::new(&settings.timezone);

    let Some(data_path) = bootstrap::discover_data_path(settings.data_dir.as_deref()) else {
        bail!(
            "No data directory found. Pass --data-dir, or place the CSV \
             tables under ./data or ~/.funnelboard/data"
        );
    };
    tracing::info!("Using data directory {}", data_path.display());

    let load_start = std::time::Instant::now();
    let (dataset, load_report) = load_dataset(&data_path, &tz)?;
    let load_time = load_start.elapsed().as_secs_f64();

    // Anchor at the requested date, or at the latest date in the data so a
    // static dataset always reproduces the same report.
    let as_of = match &settings.as_of {
        Some(raw) => tz
            .parse_timestamp(raw)
            .ok_or_else(|| DashboardError::TimestampParse(raw.clone()))?,
        None => dataset.latest_date().unwrap_or_else(Utc::now),
    };
    let ctx = MetricsContext {
        as_of,
        churn_window_days: settings.churn_window_days,
    };

    let mut report = run_dashboard(&dataset, &ctx);
    report.metadata.load_time_seconds = load_time;
    report.metadata.rows_skipped = load_report.total_skipped();

    if report.metadata.rows_skipped > 0 {
        tracing::warn!("{} rows were skipped during the load", report.metadata.rows_skipped);
    }

    let view = DashboardView::from_report(&report, &dataset);
    match settings.output.as_str() {
        "json" => println!("{}", view.to_json()?),
        _ => print!("{}", view.to_text()),
    }

    Ok(())
}
