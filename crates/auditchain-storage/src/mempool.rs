use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use auditchain_types::Audit;
use tokio::sync::Mutex;
use tracing::{instrument, warn};

use crate::error::Result;

/// Durable, append-only queue of pending audits, one JSON object per line.
///
/// A single lock guards every public operation, including the file I/O,
/// rather than trying to make the I/O itself lock-free.
pub struct Mempool {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Mempool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Appends `audit` to the durable queue. I/O failures are logged and
    /// swallowed, since a dropped mempool entry is recovered via gossip
    /// retry or chain sync rather than this call's return value.
    #[instrument(skip(self, audit), fields(req_id = %audit.req_id))]
    pub async fn append(&self, audit: &Audit) {
        let _guard = self.lock.lock().await;
        if let Err(e) = self.append_locked(audit) {
            warn!(error = %e, "failed to append audit to mempool");
        }
    }

    fn append_locked(&self, audit: &Audit) -> Result<()> {
        let line = serde_json::to_string(audit)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }

    /// Reads every audit currently on disk, top to bottom. Malformed lines
    /// are skipped with a warning rather than aborting the whole load.
    #[instrument(skip(self))]
    pub async fn load_all(&self) -> Vec<Audit> {
        let _guard = self.lock.lock().await;
        self.load_all_locked()
    }

    fn load_all_locked(&self) -> Vec<Audit> {
        let Ok(file) = fs::File::open(&self.path) else {
            return Vec::new();
        };
        let mut audits = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let Ok(line) = line else {
                warn!(lineno, "failed to read mempool line");
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Audit>(&line) {
                Ok(audit) => audits.push(audit),
                Err(e) => warn!(lineno, error = %e, "skipping malformed mempool entry"),
            }
        }
        audits
    }

    /// Atomically rewrites the mempool, omitting any audit whose `req_id`
    /// is in `ids`. Held under the same lock as every other operation, so
    /// concurrent `append`s cannot interleave with the rewrite.
    #[instrument(skip(self, ids), fields(removed = ids.len()))]
    pub async fn remove_batch(&self, ids: &HashSet<String>) {
        if ids.is_empty() {
            return;
        }
        let _guard = self.lock.lock().await;
        if let Err(e) = self.remove_batch_locked(ids) {
            warn!(error = %e, "failed to prune mempool");
        }
    }

    fn remove_batch_locked(&self, ids: &HashSet<String>) -> Result<()> {
        let remaining = self.load_all_locked();
        let kept: Vec<&Audit> = remaining
            .iter()
            .filter(|a| !ids.contains(&a.req_id))
            .collect();
        write_all(&self.path, &kept)
    }
}

fn write_all(path: &Path, audits: &[&Audit]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut buf = String::new();
    for audit in audits {
        buf.push_str(&serde_json::to_string(audit)?);
        buf.push('\n');
    }
    fs::write(path, buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditchain_types::{AccessType, FileInfo, UserInfo};
    use tempfile::tempdir;

    fn audit(req_id: &str) -> Audit {
        Audit {
            req_id: req_id.to_string(),
            file_info: FileInfo {
                file_id: "f".into(),
                file_name: "n".into(),
            },
            user_info: UserInfo {
                user_id: "u".into(),
                user_name: "n".into(),
            },
            access_type: AccessType("READ".into()),
            timestamp: 1,
            signature: String::new(),
            public_key: String::new(),
        }
    }

    #[tokio::test]
    async fn append_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let mempool = Mempool::new(dir.path().join("mempool.dat"));
        mempool.append(&audit("a")).await;
        mempool.append(&audit("b")).await;

        let loaded = mempool.load_all().await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].req_id, "a");
        assert_eq!(loaded[1].req_id, "b");
    }

    #[tokio::test]
    async fn remove_batch_excludes_only_the_named_ids() {
        let dir = tempdir().unwrap();
        let mempool = Mempool::new(dir.path().join("mempool.dat"));
        mempool.append(&audit("a")).await;
        mempool.append(&audit("b")).await;
        mempool.append(&audit("c")).await;

        let mut ids = HashSet::new();
        ids.insert("b".to_string());
        mempool.remove_batch(&ids).await;

        let loaded = mempool.load_all().await;
        let remaining: Vec<&str> = loaded.iter().map(|a| a.req_id.as_str()).collect();
        assert_eq!(remaining, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn load_all_on_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let mempool = Mempool::new(dir.path().join("does-not-exist.dat"));
        assert!(mempool.load_all().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_line_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mempool.dat");
        mempool_write_raw(&path, "not json\n");
        let mempool = Mempool::new(path.clone());
        mempool.append(&audit("a")).await;

        let loaded = mempool.load_all().await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].req_id, "a");
    }

    fn mempool_write_raw(path: &Path, contents: &str) {
        fs::write(path, contents).unwrap();
    }
}
