use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors raised by the indexing engine.
///
/// Per-file variants (`Parse`, `Extraction`, file-level `Io`) are logged and the
/// file is skipped. The remaining variants abort the run.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("parse error in {path} ({language}): {reason}")]
    Parse {
        path: String,
        language: String,
        reason: String,
    },

    #[error("extraction error in {path} at {span}: {reason}")]
    Extraction {
        path: String,
        span: String,
        reason: String,
    },

    #[error("storage busy after {attempts} attempts: {source}")]
    StorageTransient {
        attempts: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid graph document: {0}")]
    InvalidDocument(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("indexing cancelled")]
    Cancelled,
}

impl IndexError {
    pub fn config(msg: impl Into<String>) -> Self {
        IndexError::Configuration(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IndexError::Io {
            path: path.into(),
            source,
        }
    }

    /// Run-level errors abort indexing; everything else only skips one file.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            IndexError::Parse { .. } | IndexError::Extraction { .. } | IndexError::Io { .. }
        )
    }

    /// Short reason recorded in the run report for skipped files.
    pub fn skip_reason(&self) -> String {
        match self {
            IndexError::Parse { reason, .. } => format!("parse_error: {reason}"),
            IndexError::Extraction { reason, .. } => format!("extraction_error: {reason}"),
            IndexError::Io { source, .. } => format!("io_error: {source}"),
            other => other.to_string(),
        }
    }
}
