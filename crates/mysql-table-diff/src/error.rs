//! Error types for the diff library.

use thiserror::Error;

/// Main error type for diff operations.
#[derive(Error, Debug)]
pub enum DiffError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query error from either side.
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    /// Table has no index usable as a split key. Callers degrade to a
    /// single full-table chunk instead of aborting the run.
    #[error("Table {0} has no usable index to split on")]
    NoUsableIndex(String),

    /// A fetched row is missing an expected column.
    #[error("Row is missing column `{0}`")]
    MissingColumn(String),

    /// A value could not be parsed or rendered per its declared column type.
    #[error("Render error: {0}")]
    Render(String),

    /// Malformed chunk identifier string.
    #[error("Invalid chunk id {0:?}")]
    InvalidChunkId(String),

    /// Per-table check failure with context.
    #[error("Check failed for table {table}: {message}")]
    TableCheck { table: String, message: String },

    /// Worker pool task failure (including panics).
    #[error("Worker task failed: {0}")]
    Task(String),

    /// IO error (fix-SQL files, summary log).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Diff was cancelled (SIGINT, etc.)
    #[error("Diff cancelled")]
    Cancelled,
}

impl DiffError {
    /// Create a Render error.
    pub fn render(message: impl Into<String>) -> Self {
        DiffError::Render(message.into())
    }

    /// Create a TableCheck error.
    pub fn table_check(table: impl Into<String>, message: impl Into<String>) -> Self {
        DiffError::TableCheck {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error: 2 for configuration problems,
    /// 1 for everything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            DiffError::Config(_) | DiffError::Yaml(_) => 2,
            _ => 1,
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for diff operations.
pub type Result<T> = std::result::Result<T, DiffError>;
