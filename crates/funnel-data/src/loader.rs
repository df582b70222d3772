//! CSV discovery, schema validation and type coercion.
//!
//! Reads the dashboard's tabular inputs (`users.csv`, `events.csv`,
//! `plans.csv`, `sources.csv`, plus the optional `cohorts.csv` and
//! `user_cohorts.csv`) into a strongly-typed [`Dataset`]. A missing required
//! column is fatal; a row that fails type coercion is skipped, counted and
//! logged, and the load continues.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use funnel_core::error::{DashboardError, Result};
use funnel_core::models::{Cohort, Dataset, Event, Plan, Source, User, UserCohort};
use funnel_core::time_utils::TimezoneHandler;
use tracing::{debug, warn};

/// Billing period assumed when a plans file carries no `duration_days`
/// column (the common monthly-billing case).
const DEFAULT_PLAN_DURATION_DAYS: u32 = 30;

// ── Reports ───────────────────────────────────────────────────────────────────

/// Per-table load statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableReport {
    /// Rows successfully coerced into the typed table.
    pub rows_loaded: u64,
    /// Rows dropped due to coercion failures (bad date/number, unknown
    /// event type, malformed CSV record).
    pub rows_skipped: u64,
}

/// Load statistics for the whole dataset.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub users: TableReport,
    pub events: TableReport,
    pub plans: TableReport,
    pub sources: TableReport,
    pub cohorts: TableReport,
    pub user_cohorts: TableReport,
}

impl LoadReport {
    /// Total rows skipped across every table.
    pub fn total_skipped(&self) -> u64 {
        self.users.rows_skipped
            + self.events.rows_skipped
            + self.plans.rows_skipped
            + self.sources.rows_skipped
            + self.cohorts.rows_skipped
            + self.user_cohorts.rows_skipped
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.csv` files recursively under `data_path`, sorted by path.
pub fn find_csv_files(data_path: &Path) -> Vec<PathBuf> {
    if !data_path.exists() {
        warn!("Data path does not exist: {}", data_path.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(data_path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load the full dataset from a directory of CSV files.
///
/// The four core tables are required (matched by file stem, case
/// insensitive); the cohort tables are optional and default to empty.
/// Naive dates in the input are interpreted via `tz`.
pub fn load_dataset(data_path: &Path, tz: &TimezoneHandler) -> Result<(Dataset, LoadReport)> {
    if !data_path.exists() {
        return Err(DashboardError::DataPathNotFound(data_path.to_path_buf()));
    }

    let files = find_csv_files(data_path);
    if files.is_empty() {
        return Err(DashboardError::NoDataFiles(data_path.to_path_buf()));
    }

    let mut report = LoadReport::default();
    let mut dataset = Dataset::default();

    (dataset.users, report.users) = load_users(require_table(&files, "users", data_path)?, tz)?;
    (dataset.events, report.events) = load_events(require_table(&files, "events", data_path)?, tz)?;
    (dataset.plans, report.plans) = load_plans(require_table(&files, "plans", data_path)?)?;
    (dataset.sources, report.sources) = load_sources(require_table(&files, "sources", data_path)?)?;

    if let Some(path) = locate_table(&files, "cohorts") {
        (dataset.cohorts, report.cohorts) = load_cohorts(path, tz)?;
    }
    if let Some(path) = locate_table(&files, "user_cohorts") {
        (dataset.user_cohorts, report.user_cohorts) = load_user_cohorts(path)?;
    }

    // Chronological order for downstream single-pass consumers.
    dataset.events.sort_by_key(|e| e.event_date);

    for (table, len) in [
        ("users", dataset.users.len()),
        ("events", dataset.events.len()),
        ("plans", dataset.plans.len()),
        ("sources", dataset.sources.len()),
    ] {
        if len == 0 {
            warn!("Table `{}` has no rows; dependent metrics will be empty", table);
        }
    }

    debug!(
        "Loaded {} users, {} events, {} plans, {} sources ({} rows skipped)",
        dataset.users.len(),
        dataset.events.len(),
        dataset.plans.len(),
        dataset.sources.len(),
        report.total_skipped(),
    );

    Ok((dataset, report))
}

// ── Table loaders ─────────────────────────────────────────────────────────────

/// Load the users table. Required: `user_id`, `signup_date`, `plan_id`,
/// `source_id`. Optional: `country`.
pub fn load_users(path: &Path, tz: &TimezoneHandler) -> Result<(Vec<User>, TableReport)> {
    let mut reader = open_csv(path)?;
    let columns = ColumnMap::new("users", reader.headers()?);

    let user_id = columns.require(&["user_id"])?;
    let signup_date = columns.require(&["signup_date"])?;
    let plan_id = columns.require(&["plan_id"])?;
    let source_id = columns.require(&["source_id"])?;
    let country = columns.optional(&["country"]);

    let mut users = Vec::new();
    let mut report = TableReport::default();

    for (row, record) in typed_rows(&mut reader, "users", &mut report) {
        let parsed = (|| -> std::result::Result<User, String> {
            Ok(User {
                user_id: parse_int(&record, user_id, "user_id")?,
                signup_date: parse_date(&record, signup_date, "signup_date", tz)?,
                plan_id: parse_int(&record, plan_id, "plan_id")?,
                source_id: parse_int(&record, source_id, "source_id")?,
                country: country
                    .and_then(|i| record.get(i))
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            })
        })();
        collect_row("users", row, parsed, &mut users, &mut report);
    }

    Ok((users, report))
}

/// Load the events table. Required: `user_id`, `event_type`, `event_date`.
/// Rows with an event type outside {visit, signup, trial, paid} are skipped.
pub fn load_events(path: &Path, tz: &TimezoneHandler) -> Result<(Vec<Event>, TableReport)> {
    let mut reader = open_csv(path)?;
    let columns = ColumnMap::new("events", reader.headers()?);

    let user_id = columns.require(&["user_id"])?;
    let event_type = columns.require(&["event_type"])?;
    let event_date = columns.require(&["event_date"])?;

    let mut events = Vec::new();
    let mut report = TableReport::default();

    for (row, record) in typed_rows(&mut reader, "events", &mut report) {
        let parsed = (|| -> std::result::Result<Event, String> {
            Ok(Event {
                user_id: parse_int(&record, user_id, "user_id")?,
                event_type: record.get(event_type).unwrap_or_default().parse()?,
                event_date: parse_date(&record, event_date, "event_date", tz)?,
            })
        })();
        collect_row("events", row, parsed, &mut events, &mut report);
    }

    Ok((events, report))
}

/// Load the plans table. Required: `plan_id`, `plan_name`/`name`, `price`.
/// Optional: `duration_days` (defaults to 30). Negative prices and
/// non-positive durations fail row coercion.
pub fn load_plans(path: &Path) -> Result<(Vec<Plan>, TableReport)> {
    let mut reader = open_csv(path)?;
    let columns = ColumnMap::new("plans", reader.headers()?);

    let plan_id = columns.require(&["plan_id"])?;
    let name = columns.require(&["plan_name", "name"])?;
    let price = columns.require(&["price"])?;
    let duration_days = columns.optional(&["duration_days"]);

    let mut plans = Vec::new();
    let mut report = TableReport::default();

    for (row, record) in typed_rows(&mut reader, "plans", &mut report) {
        let parsed = (|| -> std::result::Result<Plan, String> {
            let price = parse_float(&record, price, "price")?;
            if price < 0.0 {
                return Err(format!("negative price {}", price));
            }
            let duration = match duration_days {
                Some(i) => parse_int(&record, i, "duration_days")?,
                None => i64::from(DEFAULT_PLAN_DURATION_DAYS),
            };
            if duration <= 0 {
                return Err(format!("non-positive duration_days {}", duration));
            }
            Ok(Plan {
                plan_id: parse_int(&record, plan_id, "plan_id")?,
                name: record.get(name).unwrap_or_default().trim().to_string(),
                price,
                duration_days: duration as u32,
            })
        })();
        collect_row("plans", row, parsed, &mut plans, &mut report);
    }

    Ok((plans, report))
}

/// Load the sources table. Required: `source_id`, `source_name`/`name`.
pub fn load_sources(path: &Path) -> Result<(Vec<Source>, TableReport)> {
    let mut reader = open_csv(path)?;
    let columns = ColumnMap::new("sources", reader.headers()?);

    let source_id = columns.require(&["source_id"])?;
    let name = columns.require(&["source_name", "name"])?;

    let mut sources = Vec::new();
    let mut report = TableReport::default();

    for (row, record) in typed_rows(&mut reader, "sources", &mut report) {
        let parsed = (|| -> std::result::Result<Source, String> {
            Ok(Source {
                source_id: parse_int(&record, source_id, "source_id")?,
                name: record.get(name).unwrap_or_default().trim().to_string(),
            })
        })();
        collect_row("sources", row, parsed, &mut sources, &mut report);
    }

    Ok((sources, report))
}

/// Load the optional explicit cohorts table. Required when present:
/// `cohort_id`, `cohort_name`/`name`, `start_date`, `end_date`.
pub fn load_cohorts(path: &Path, tz: &TimezoneHandler) -> Result<(Vec<Cohort>, TableReport)> {
    let mut reader = open_csv(path)?;
    let columns = ColumnMap::new("cohorts", reader.headers()?);

    let cohort_id = columns.require(&["cohort_id"])?;
    let name = columns.require(&["cohort_name", "name"])?;
    let start_date = columns.require(&["start_date"])?;
    let end_date = columns.require(&["end_date"])?;

    let mut cohorts = Vec::new();
    let mut report = TableReport::default();

    for (row, record) in typed_rows(&mut reader, "cohorts", &mut report) {
        let parsed = (|| -> std::result::Result<Cohort, String> {
            Ok(Cohort {
                cohort_id: parse_int(&record, cohort_id, "cohort_id")?,
                name: record.get(name).unwrap_or_default().trim().to_string(),
                start_date: parse_date(&record, start_date, "start_date", tz)?,
                end_date: parse_date(&record, end_date, "end_date", tz)?,
            })
        })();
        collect_row("cohorts", row, parsed, &mut cohorts, &mut report);
    }

    Ok((cohorts, report))
}

/// Load the optional user/cohort association table. Required when present:
/// `user_id`, `cohort_id`.
pub fn load_user_cohorts(path: &Path) -> Result<(Vec<UserCohort>, TableReport)> {
    let mut reader = open_csv(path)?;
    let columns = ColumnMap::new("user_cohorts", reader.headers()?);

    let user_id = columns.require(&["user_id"])?;
    let cohort_id = columns.require(&["cohort_id"])?;

    let mut memberships = Vec::new();
    let mut report = TableReport::default();

    for (row, record) in typed_rows(&mut reader, "user_cohorts", &mut report) {
        let parsed = (|| -> std::result::Result<UserCohort, String> {
            Ok(UserCohort {
                user_id: parse_int(&record, user_id, "user_id")?,
                cohort_id: parse_int(&record, cohort_id, "cohort_id")?,
            })
        })();
        collect_row("user_cohorts", row, parsed, &mut memberships, &mut report);
    }

    Ok((memberships, report))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Locate a required table, or fail with `MissingTable`.
fn require_table<'a>(files: &'a [PathBuf], table: &str, data_path: &Path) -> Result<&'a PathBuf> {
    locate_table(files, table).ok_or_else(|| DashboardError::MissingTable {
        table: table.to_string(),
        path: data_path.to_path_buf(),
    })
}

/// Match a discovered file to a table by its (lowercased) file stem.
fn locate_table<'a>(files: &'a [PathBuf], table: &str) -> Option<&'a PathBuf> {
    files.iter().find(|p| {
        p.file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.eq_ignore_ascii_case(table))
            .unwrap_or(false)
    })
}

fn open_csv(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    let file = std::fs::File::open(path).map_err(|source| DashboardError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file))
}

/// Case-insensitive header index with alias support.
///
/// Unknown extra columns simply never get looked up; they are ignored, not
/// an error.
struct ColumnMap {
    table: &'static str,
    index: HashMap<String, usize>,
}

impl ColumnMap {
    fn new(table: &'static str, headers: &csv::StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();
        Self { table, index }
    }

    /// Index of the first matching alias, or `SchemaMismatch` naming the
    /// canonical (first) alias.
    fn require(&self, aliases: &[&str]) -> Result<usize> {
        self.optional(aliases)
            .ok_or_else(|| DashboardError::SchemaMismatch {
                table: self.table.to_string(),
                column: aliases[0].to_string(),
            })
    }

    fn optional(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|a| self.index.get(*a).copied())
    }
}

/// Read all data rows as `(1-based file row, record)`, skipping and counting
/// records the CSV parser itself rejects (ragged rows, bad quoting).
fn typed_rows(
    reader: &mut csv::Reader<std::fs::File>,
    table: &'static str,
    report: &mut TableReport,
) -> Vec<(u64, csv::StringRecord)> {
    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        // +2: 1-based, after the header row.
        let row = i as u64 + 2;
        match result {
            Ok(record) => rows.push((row, record)),
            Err(e) => {
                warn!("Table `{}` row {}: malformed record skipped: {}", table, row, e);
                report.rows_skipped += 1;
            }
        }
    }
    rows
}

/// Push a successfully parsed row, or count and log a skipped one.
fn collect_row<T>(
    table: &str,
    row: u64,
    parsed: std::result::Result<T, String>,
    out: &mut Vec<T>,
    report: &mut TableReport,
) {
    match parsed {
        Ok(value) => {
            out.push(value);
            report.rows_loaded += 1;
        }
        Err(message) => {
            let err = DashboardError::ParseError {
                table: table.to_string(),
                row,
                message,
            };
            warn!("{err}; row skipped");
            report.rows_skipped += 1;
        }
    }
}

fn parse_int(record: &csv::StringRecord, idx: usize, column: &str) -> std::result::Result<i64, String> {
    let raw = record.get(idx).unwrap_or_default().trim();
    raw.parse::<i64>()
        .map_err(|_| format!("cannot parse `{}` as integer {}", raw, column))
}

fn parse_float(record: &csv::StringRecord, idx: usize, column: &str) -> std::result::Result<f64, String> {
    let raw = record.get(idx).unwrap_or_default().trim();
    raw.parse::<f64>()
        .map_err(|_| format!("cannot parse `{}` as numeric {}", raw, column))
}

fn parse_date(
    record: &csv::StringRecord,
    idx: usize,
    column: &str,
    tz: &TimezoneHandler,
) -> std::result::Result<chrono::DateTime<chrono::Utc>, String> {
    let raw = record.get(idx).unwrap_or_default();
    tz.parse_timestamp(raw)
        .ok_or_else(|| format!("cannot parse `{}` as {} date", raw.trim(), column))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
