use thiserror::Error;

/// Startup failures. Anything reaching `main` as one of these is fatal:
/// the process logs it and exits non-zero.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] auditchain_cluster::Error),

    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StartupError>;
