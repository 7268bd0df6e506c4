use std::sync::Arc;
use std::time::Duration;

use auditchain_cluster::{ElectionState, PeerTable};
use auditchain_rpc::{PeerStub, Request, Response};
use tracing::{instrument, warn};

use crate::ledger::Ledger;

const HEARTBEAT_DEADLINE: Duration = Duration::from_secs(1);
const SYNC_DEADLINE: Duration = Duration::from_secs(1);

/// Periodically broadcasts this replica's state, refreshes its own
/// `PeerTable` row, sweeps stale peers, and runs ChainSync. One instance
/// per replica; runs for the process lifetime.
pub struct HeartbeatDriver {
    self_address: String,
    interval: Duration,
    peer_timeout: Duration,
    election: Arc<ElectionState>,
    peer_table: Arc<PeerTable>,
    ledger: Arc<Ledger>,
    peers: Vec<Arc<PeerStub>>,
}

impl HeartbeatDriver {
    pub fn new(
        self_address: String,
        interval: Duration,
        peer_timeout: Duration,
        election: Arc<ElectionState>,
        peer_table: Arc<PeerTable>,
        ledger: Arc<Ledger>,
        peers: Vec<Arc<PeerStub>>,
    ) -> Self {
        Self {
            self_address,
            interval,
            peer_timeout,
            election,
            peer_table,
            ledger,
            peers,
        }
    }

    pub async fn run(&self, running: Arc<std::sync::atomic::AtomicBool>) {
        use std::sync::atomic::Ordering;

        while running.load(Ordering::Relaxed) {
            tokio::time::sleep(self.interval).await;
            if !running.load(Ordering::Relaxed) {
                break;
            }
            self.tick().await;
        }
    }

    #[instrument(skip(self))]
    async fn tick(&self) {
        let leader = self.election.current_leader().await;
        let last_id = self.ledger.chain().get_last_id().await;
        let mempool_size = self.ledger.mempool().load_all().await.len();

        self.broadcast_heartbeat(leader.clone(), last_id, mempool_size)
            .await;

        self.peer_table
            .update(&self.self_address, leader, last_id, mempool_size)
            .await;

        self.peer_table.sweep(self.peer_timeout).await;

        self.chain_sync().await;
    }

    async fn broadcast_heartbeat(&self, leader: Option<String>, last_id: i64, mempool_size: usize) {
        for peer in &self.peers {
            let request = Request::SendHeartbeat {
                from_address: self.self_address.clone(),
                leader: leader.clone(),
                latest_block_id: last_id,
                mempool_size,
            };
            if let Err(e) = peer.call(request, HEARTBEAT_DEADLINE).await {
                warn!(peer = peer.address(), error = %e, "heartbeat RPC failed");
            }
        }
    }

    /// Scans alive peers for one ahead of `local.lastId`, picks the
    /// highest-reporting, and pulls every missing block from it via
    /// `GetBlock`. No Merkle/signature re-verification is performed — the
    /// source peer is trusted, a known gap in a crash-stop, non-Byzantine
    /// cluster.
    #[instrument(skip(self))]
    async fn chain_sync(&self) {
        let local_last_id = self.ledger.chain().get_last_id().await;

        let ahead_peers = self.peer_table.all().await;
        let Some(target) = ahead_peers
            .into_iter()
            .filter(|p| p.alive && p.latest_block_id > local_last_id)
            .max_by_key(|p| p.latest_block_id)
        else {
            return;
        };

        let Some(stub) = self
            .peers
            .iter()
            .find(|p| p.address() == target.from_address)
        else {
            return;
        };

        for id in (local_last_id + 1)..=target.latest_block_id {
            let response = stub.call(Request::GetBlock { id }, SYNC_DEADLINE).await;
            let block = match response {
                Ok(Response::GetBlock(r)) if r.status.is_success() => match r.block {
                    Some(block) => block,
                    None => {
                        warn!(peer = %target.from_address, id, "GetBlock succeeded with no block body, aborting sync tick");
                        return;
                    }
                },
                Ok(Response::GetBlock(r)) => {
                    warn!(peer = %target.from_address, id, error = ?r.error_message, "GetBlock failed, aborting sync tick");
                    return;
                }
                Ok(other) => {
                    warn!(peer = %target.from_address, id, ?other, "unexpected GetBlock response");
                    return;
                }
                Err(e) => {
                    warn!(peer = %target.from_address, id, error = %e, "GetBlock RPC failed, aborting sync tick");
                    return;
                }
            };

            if let Err(e) = self.ledger.commit_locally(&block).await {
                warn!(id, error = %e, "failed to commit synced block, aborting sync tick");
                return;
            }
        }
    }
}
