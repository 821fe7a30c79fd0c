//! Error types for yelpdb operations
//!
//! Every failure propagates to the caller; nothing is retried or recovered locally.

use std::path::PathBuf;

use crate::ingest::SourceKind;

/// Result type alias for yelpdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for yelpdb operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration file unreadable, or a required key missing or malformed
    #[error("configuration error in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    /// A required source file is absent from the raw data folder
    #[error("required {kind} file not found in {}", folder.display())]
    MissingInput { kind: SourceKind, folder: PathBuf },

    /// A line of a source file is not a JSON object
    #[error("malformed JSON in {} at line {line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A row could not be written; identifies the source record
    #[error("failed to insert record from {} line {line}: {source}", path.display())]
    Insert {
        path: PathBuf,
        line: usize,
        #[source]
        source: rusqlite::Error,
    },

    /// The existing table lacks a column the entity mapping writes to
    #[error("table '{table}' has no column '{column}'")]
    SchemaMismatch { table: String, column: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Line number of the offending source record, if the error is tied to one
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Parse { line, .. } | Error::Insert { line, .. } => Some(*line),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message_names_file_and_line() {
        let err = Error::Parse {
            path: PathBuf::from("raw/review.json"),
            line: 3,
            message: "expected value".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("raw/review.json"));
        assert!(msg.contains("line 3"));
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_missing_input_message() {
        let err = Error::MissingInput {
            kind: SourceKind::User,
            folder: PathBuf::from("/data"),
        };
        assert_eq!(err.to_string(), "required user file not found in /data");
        assert_eq!(err.line(), None);
    }
}
