use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Liveness and last-advertised state for one peer, keyed by the peer's
/// self-reported address. Entries are created on first heartbeat and
/// transition `alive -> dead` on a sweep; they are never erased, so
/// staleness stays observable.
#[derive(Debug, Clone)]
pub struct PeerEntry {
    pub from_address: String,
    pub claimed_leader: Option<String>,
    pub latest_block_id: i64,
    pub mempool_size: usize,
    pub last_seen: Instant,
    pub alive: bool,
}

#[derive(Default)]
struct Inner {
    peers: HashMap<String, PeerEntry>,
}

/// Thread-safe view of peer liveness and claimed state. One mutex guards
/// the whole map; `update`, `sweep`, and `all` each take it for the
/// duration of their call, never across an outbound RPC.
pub struct PeerTable {
    inner: Mutex<Inner>,
}

impl Default for PeerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Records a heartbeat (or first contact) from `from_address`.
    pub async fn update(
        &self,
        from_address: &str,
        claimed_leader: Option<String>,
        latest_block_id: i64,
        mempool_size: usize,
    ) {
        let mut inner = self.inner.lock().await;
        inner
            .peers
            .entry(from_address.to_string())
            .and_modify(|entry| {
                entry.claimed_leader = claimed_leader.clone();
                entry.latest_block_id = latest_block_id;
                entry.mempool_size = mempool_size;
                entry.last_seen = Instant::now();
                entry.alive = true;
            })
            .or_insert_with(|| PeerEntry {
                from_address: from_address.to_string(),
                claimed_leader,
                latest_block_id,
                mempool_size,
                last_seen: Instant::now(),
                alive: true,
            });
    }

    /// Marks every entry whose `last_seen` is older than `timeout` as dead.
    /// Never removes a row.
    pub async fn sweep(&self, timeout: Duration) {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        for entry in inner.peers.values_mut() {
            if now.duration_since(entry.last_seen) > timeout {
                entry.alive = false;
            }
        }
    }

    pub async fn all(&self) -> Vec<PeerEntry> {
        self.inner.lock().await.peers.values().cloned().collect()
    }

    pub async fn get(&self, address: &str) -> Option<PeerEntry> {
        self.inner.lock().await.peers.get(address).cloned()
    }

    pub async fn is_alive(&self, address: &str) -> bool {
        self.inner
            .lock()
            .await
            .peers
            .get(address)
            .is_some_and(|e| e.alive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[tokio::test]
    async fn first_heartbeat_creates_an_alive_entry() {
        let table = PeerTable::new();
        table.update("10.0.0.1:1", Some("10.0.0.1:1".into()), 3, 2).await;

        let entry = table.get("10.0.0.1:1").await.unwrap();
        assert!(entry.alive);
        assert_eq!(entry.latest_block_id, 3);
        assert_eq!(entry.mempool_size, 2);
    }

    #[tokio::test]
    async fn sweep_marks_stale_entries_dead_without_erasing_them() {
        let table = PeerTable::new();
        table.update("10.0.0.1:1", None, 0, 0).await;
        sleep(Duration::from_millis(20));

        table.sweep(Duration::from_millis(5)).await;

        let entry = table.get("10.0.0.1:1").await.unwrap();
        assert!(!entry.alive);
    }

    #[tokio::test]
    async fn sweep_leaves_fresh_entries_alive() {
        let table = PeerTable::new();
        table.update("10.0.0.1:1", None, 0, 0).await;

        table.sweep(Duration::from_secs(10)).await;

        assert!(table.is_alive("10.0.0.1:1").await);
    }
}
