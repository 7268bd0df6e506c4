use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Loads `peers.json`: either a JSON array of `"host:port"` strings, or a
/// single-line comma-separated form, tolerated for operator convenience.
/// Excludes self by convention (the caller's own address is never listed).
pub fn load_peers(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let contents = read(path)?;
    let trimmed = contents.trim();

    if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|source| Error::Malformed {
            path: path.display().to_string(),
            source,
        })
    } else {
        Ok(trimmed
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// `leader.json`: `{ "leader_addr": "host:port", "batch_size": int,
/// "batch_interval_s": int }`. Missing any field is fatal at startup.
#[derive(Debug, Clone)]
pub struct LeaderConfig {
    pub leader_addr: String,
    pub batch_size: usize,
    pub batch_interval: Duration,
}

#[derive(Deserialize)]
struct RawLeaderConfig {
    leader_addr: Option<String>,
    batch_size: Option<usize>,
    batch_interval_s: Option<u64>,
}

pub fn load_leader_config(path: impl AsRef<Path>) -> Result<LeaderConfig> {
    let path = path.as_ref();
    let contents = read(path)?;
    let raw: RawLeaderConfig = serde_json::from_str(&contents).map_err(|source| Error::Malformed {
        path: path.display().to_string(),
        source,
    })?;

    let mut missing = Vec::new();
    if raw.leader_addr.is_none() {
        missing.push("leader_addr");
    }
    if raw.batch_size.is_none() {
        missing.push("batch_size");
    }
    if raw.batch_interval_s.is_none() {
        missing.push("batch_interval_s");
    }
    if !missing.is_empty() {
        return Err(Error::IncompleteLeaderConfig(missing.join(", ")));
    }

    Ok(LeaderConfig {
        leader_addr: raw.leader_addr.unwrap(),
        batch_size: raw.batch_size.unwrap(),
        batch_interval: Duration::from_secs(raw.batch_interval_s.unwrap()),
    })
}

/// Accepts a stray top-level JSON `null`/empty object the same way a plain
/// "file not found" would be treated elsewhere: as a configuration error,
/// not a panic.
fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })
}
