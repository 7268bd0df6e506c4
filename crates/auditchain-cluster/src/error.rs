use thiserror::Error;

/// Cluster configuration errors. A missing or malformed `leader.json` is
/// fatal at startup; `peers.json` problems are likewise surfaced here so
/// `main` can exit with a non-zero code.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config at {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("leader.json is missing required field(s): {0}")]
    IncompleteLeaderConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
