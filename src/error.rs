use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced at the library boundary.
///
/// Ambiguous player names are never an error: they fall out of resolution as
/// non-roster passthroughs.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("malformed match document #{index}: {reason}")]
    MalformedInput { index: usize, reason: String },

    #[error("ledger store operation failed: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("failed to encode ledger column: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid roster configuration: {message}")]
    Config { message: String },

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl LedgerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
