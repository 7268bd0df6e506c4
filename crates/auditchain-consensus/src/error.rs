use thiserror::Error;

/// Errors surfaced by the ledger and its drivers. Wraps the lower crates'
/// own error types rather than re-stringifying them, so a caller can still
/// match on the underlying cause.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("block artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chain store error: {0}")]
    Storage(#[from] auditchain_storage::StorageError),

    #[error("block artifact is corrupt: {0}")]
    CorruptArtifact(serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
