use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure the standard `~/.funnelboard/` directory hierarchy exists.
///
/// Creates the following directories if absent (including any missing parents):
/// - `~/.funnelboard/`
/// - `~/.funnelboard/logs/`
pub fn ensure_directories() -> anyhow::Result<()> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let board_dir = home.join(".funnelboard");
    std::fs::create_dir_all(&board_dir)?;
    std::fs::create_dir_all(board_dir.join("logs"))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// `log_level` is mapped to a [`tracing_subscriber::EnvFilter`] directive.
/// Falls back to `"info"` if the level string is not recognised.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    // Map Python-style log-level names to tracing level names (lowercase).
    let upper = log_level.to_uppercase();
    let normalised = match upper.as_str() {
        "DEBUG" | "CRITICAL" => "debug",
        "INFO" => "info",
        "WARNING" => "warn",
        "ERROR" => "error",
        other => other,
    };

    let filter = EnvFilter::try_new(normalised).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt::layer().with_target(false).with_thread_ids(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .init();

    Ok(())
}

// ── Data-path discovery ────────────────────────────────────────────────────────

/// Locate the directory holding the CSV tables.
///
/// Checks the following in order and returns the first that exists:
/// 1. the `--data-dir` flag, when given;
/// 2. `./data` relative to the working directory;
/// 3. `~/.funnelboard/data`.
///
/// Returns `None` when none of them exists.
pub fn discover_data_path(flag: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = flag {
        return dir.exists().then(|| dir.to_path_buf());
    }

    let local = PathBuf::from("data");
    if local.exists() {
        return Some(local);
    }

    let home = dirs::home_dir()?;
    let fallback = home.join(".funnelboard").join("data");
    fallback.exists().then_some(fallback)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
