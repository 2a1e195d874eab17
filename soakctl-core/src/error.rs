//! Structured error types for soakctl-core.
//!
//! Every variant is fatal for the soak run. Library code only returns these;
//! the binary decides how to report them and exit.

use thiserror::Error;

/// Main error type for soak operations
#[derive(Error, Debug)]
pub enum SoakError {
    /// Connection string or settings are unusable
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Pool or connection establishment failed
    #[error("Failed to connect to database: {source}")]
    Connect {
        #[source]
        source: sqlx::Error,
    },

    /// Schema reset script failed
    #[error("Unable to setup database: {source}")]
    Setup {
        #[source]
        source: sqlx::Error,
    },

    /// Query execution or row streaming failed
    #[error("Query failed: {source}")]
    Query {
        #[source]
        source: sqlx::Error,
    },

    /// A column value could not be decoded into a record
    #[error("Failed to decode row {row}: {source}")]
    Decode {
        row: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The column itself could not be read from the row
    #[error("Failed to read column of row {row}: {source}")]
    Column {
        row: usize,
        #[source]
        source: sqlx::Error,
    },

    /// Result cardinality diverged from the seeded dataset
    #[error("len(result) is expected to be {expected}, but got {actual}")]
    RowCount { expected: usize, actual: usize },

    /// A worker task panicked or was cancelled before reporting
    #[error("Worker task failed in round {round}: {reason}")]
    Worker { round: u64, reason: String },

    /// Writing a memory sample to the console failed
    #[error("Failed to emit memory sample: {source}")]
    Output {
        #[from]
        source: std::io::Error,
    },
}

/// Result type alias for soak operations
pub type Result<T> = std::result::Result<T, SoakError>;

impl SoakError {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create a worker failure for a round
    pub fn worker(round: u64, reason: impl Into<String>) -> Self {
        Self::Worker {
            round,
            reason: reason.into(),
        }
    }

    /// Short name of the failed operation, used as the log field on exit
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Connect { .. } => "connect",
            Self::Setup { .. } => "setup",
            Self::Query { .. } => "query",
            Self::Decode { .. } | Self::Column { .. } => "decode",
            Self::RowCount { .. } => "assert",
            Self::Worker { .. } => "worker",
            Self::Output { .. } => "sample",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SoakError::RowCount {
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "len(result) is expected to be 3, but got 2");

        let err = SoakError::config("DATABASE_URL is empty");
        assert_eq!(err.to_string(), "Configuration error: DATABASE_URL is empty");
    }

    #[test]
    fn test_decode_error_names_row() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = SoakError::Decode { row: 2, source };
        assert!(err.to_string().starts_with("Failed to decode row 2"));
        assert_eq!(err.operation(), "decode");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err: SoakError = io_err.into();

        assert!(matches!(err, SoakError::Output { .. }));
        assert_eq!(err.operation(), "sample");
    }
}
