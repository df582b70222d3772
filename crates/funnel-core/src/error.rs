use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the funnel dashboard.
#[derive(Error, Debug)]
pub enum DashboardError {
    /// A required column is absent from a table. Fatal to the load.
    #[error("Table `{table}` is missing required column `{column}`")]
    SchemaMismatch { table: String, column: String },

    /// A row-level value could not be coerced to its expected type.
    ///
    /// Row-level: the loader logs this, skips the offending row and keeps
    /// a count rather than failing the whole load.
    #[error("Table `{table}` row {row}: {message}")]
    ParseError {
        table: String,
        row: u64,
        message: String,
    },

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The expected data directory does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// No CSV files were found under the given directory.
    #[error("No CSV files found in {0}")]
    NoDataFiles(PathBuf),

    /// A required table file is absent from the data directory.
    #[error("Required table `{table}` not found under {path}")]
    MissingTable { table: String, path: PathBuf },

    /// A CSV document could not be read or parsed at the file level.
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A timestamp string did not match any recognised format.
    #[error("Invalid timestamp format: {0}")]
    TimestampParse(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the dashboard crates.
pub type Result<T> = std::result::Result<T, DashboardError>;
