//! Error types for the migration library.

use thiserror::Error;

/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for source database errors.
pub const EXIT_SOURCE_ERROR: u8 = 2;
/// Exit code for destination database errors.
pub const EXIT_TARGET_ERROR: u8 = 3;
/// Exit code for connection pool errors.
pub const EXIT_POOL_ERROR: u8 = 4;
/// Exit code for transfer errors.
pub const EXIT_TRANSFER_ERROR: u8 = 5;
/// Exit code for IO errors (missing files, etc.).
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit code for anything else.
pub const EXIT_OTHER_ERROR: u8 = 8;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source (PostgreSQL) connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] tokio_postgres::Error),

    /// Destination (Oracle) connection or statement error
    #[error("Target database error: {0}")]
    Target(#[from] oracle::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Schema extraction failed
    #[error("Schema extraction failed: {0}")]
    SchemaExtraction(String),

    /// Data transfer failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// A background task panicked or was aborted
    #[error("Task failed: {0}")]
    Task(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error category.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => EXIT_CONFIG_ERROR,
            MigrateError::Source(_) | MigrateError::SchemaExtraction(_) => EXIT_SOURCE_ERROR,
            MigrateError::Target(_) => EXIT_TARGET_ERROR,
            MigrateError::Pool { .. } => EXIT_POOL_ERROR,
            MigrateError::Transfer { .. } => EXIT_TRANSFER_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
            MigrateError::Task(_) | MigrateError::Json(_) => EXIT_OTHER_ERROR,
        }
    }

    /// Format error with full details including error chain
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

impl From<tokio::task::JoinError> for MigrateError {
    fn from(err: tokio::task::JoinError) -> Self {
        MigrateError::Task(err.to_string())
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
