use std::fs;
use std::path::PathBuf;

use auditchain_types::BlockMeta;
use tokio::sync::Mutex;
use tracing::{instrument, warn};

use crate::error::Result;

struct Inner {
    blocks: Vec<BlockMeta>,
}

/// Persistent, in-memory-indexed block index. A single mutex protects both
/// the in-memory vector and the on-disk rewrite in [`ChainStore::append`],
/// so readers never observe the new element before the rewrite has
/// succeeded.
pub struct ChainStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl ChainStore {
    /// Loads `chain.json`. A missing file yields an empty chain; a corrupt
    /// file also yields an empty chain, with the parse error logged rather
    /// than propagated — this is not considered a fatal condition.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let blocks = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(blocks) => blocks,
                Err(e) => {
                    warn!(error = %e, "chain.json is corrupt, starting from an empty chain");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self {
            path,
            inner: Mutex::new(Inner { blocks }),
        }
    }

    pub async fn get_last_id(&self) -> i64 {
        self.inner.lock().await.blocks.last().map_or(0, |b| b.id)
    }

    pub async fn get_last_hash(&self) -> String {
        self.inner
            .lock()
            .await
            .blocks
            .last()
            .map_or_else(String::new, |b| b.hash.clone())
    }

    pub async fn get_last_merkle_root(&self) -> String {
        self.inner
            .lock()
            .await
            .blocks
            .last()
            .map_or_else(String::new, |b| b.merkle_root.clone())
    }

    pub async fn get_all(&self) -> Vec<BlockMeta> {
        self.inner.lock().await.blocks.clone()
    }

    pub async fn get(&self, id: i64) -> Option<BlockMeta> {
        self.inner
            .lock()
            .await
            .blocks
            .iter()
            .find(|b| b.id == id)
            .cloned()
    }

    /// Appends `meta`, mutating the in-memory vector and rewriting the file
    /// while still holding the lock — preserving invariant I2 (strictly
    /// increasing, gap-free ids) even under concurrent callers.
    #[instrument(skip(self, meta), fields(id = meta.id))]
    pub async fn append(&self, meta: BlockMeta) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.blocks.push(meta);
        self.write_locked(&inner.blocks)
    }

    fn write_locked(&self, blocks: &[BlockMeta]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(blocks)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
