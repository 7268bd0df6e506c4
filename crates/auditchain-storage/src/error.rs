use thiserror::Error;

/// Storage errors. I/O failures here are generally logged and treated as
/// non-fatal by callers rather than propagated as hard failures — the
/// `Result` exists so callers can choose that policy explicitly rather
/// than the crate swallowing errors silently.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
