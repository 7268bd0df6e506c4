use std::sync::Arc;
use std::time::Duration;

use auditchain_cluster::ElectionState;
use auditchain_rpc::{PeerStub, Request, Response};
use auditchain_storage::{ChainStore, Mempool};
use auditchain_types::{Audit, Block, block_hash, leaf_hash, merkle_root};
use tracing::{info, instrument, warn};

use crate::ledger::Ledger;

const PROPOSE_DEADLINE: Duration = Duration::from_millis(200);
const COMMIT_DEADLINE: Duration = Duration::from_millis(200);

/// Leader-only block builder: wakes on `batch_size`-or-`batch_interval`,
/// drains the mempool into a block, and drives the two-phase propose/commit
/// round across the static peer set.
pub struct BlockScheduler {
    self_address: String,
    mempool: Arc<Mempool>,
    chain: Arc<ChainStore>,
    election: Arc<ElectionState>,
    ledger: Arc<Ledger>,
    peers: Vec<Arc<PeerStub>>,
    batch_size: usize,
    batch_interval: Duration,
}

impl BlockScheduler {
    pub fn new(
        self_address: String,
        mempool: Arc<Mempool>,
        chain: Arc<ChainStore>,
        election: Arc<ElectionState>,
        ledger: Arc<Ledger>,
        peers: Vec<Arc<PeerStub>>,
        batch_size: usize,
        batch_interval: Duration,
    ) -> Self {
        Self {
            self_address,
            mempool,
            chain,
            election,
            ledger,
            peers,
            batch_size,
            batch_interval,
        }
    }

    /// Poll granularity for the "batch_size pending" wake condition. The
    /// interval itself always resets to `batch_interval` every iteration
    /// regardless of why the previous wake happened, matching the
    /// reference's unconditional re-arm (see DESIGN.md).
    const POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// Runs until `running` is set to false. Wakes early once at least
    /// `batch_size` audits are pending, otherwise waits the full
    /// `batch_interval`.
    pub async fn run(&self, running: Arc<std::sync::atomic::AtomicBool>) {
        use std::sync::atomic::Ordering;

        while running.load(Ordering::Relaxed) {
            self.wait_for_wake(&running).await;
            if !running.load(Ordering::Relaxed) {
                break;
            }
            if let Err(e) = self.tick().await {
                warn!(error = %e, "block scheduler tick failed");
            }
        }
    }

    async fn wait_for_wake(&self, running: &Arc<std::sync::atomic::AtomicBool>) {
        use std::sync::atomic::Ordering;

        let deadline = tokio::time::Instant::now() + self.batch_interval;
        loop {
            if !running.load(Ordering::Relaxed) || tokio::time::Instant::now() >= deadline {
                return;
            }
            if self.mempool.load_all().await.len() >= self.batch_size {
                return;
            }
            tokio::time::sleep(Self::POLL_INTERVAL).await;
        }
    }

    #[instrument(skip(self))]
    async fn tick(&self) -> crate::Result<()> {
        let is_leader = self.election.current_leader().await.as_deref() == Some(&self.self_address);
        if !is_leader {
            return Ok(());
        }

        let mut pending = self.mempool.load_all().await;
        if pending.is_empty() {
            return Ok(());
        }

        pending.sort_by(|a, b| (a.timestamp, &a.req_id).cmp(&(b.timestamp, &b.req_id)));

        let block = self.build_block(pending).await;

        if !self.propose(&block).await {
            info!(id = block.id, "proposal rejected by a peer, discarding block");
            return Ok(());
        }

        self.commit(&block).await;

        self.ledger.commit_locally(&block).await
    }

    async fn build_block(&self, audits: Vec<Audit>) -> Block {
        let previous_hash = self.chain.get_last_hash().await;
        let id = self.chain.get_last_id().await + 1;

        let leaves: Vec<String> = audits.iter().map(leaf_hash).collect();
        let root = merkle_root(&leaves);
        let hash = block_hash(id, &previous_hash, &root, &audits);

        Block {
            id,
            previous_hash,
            merkle_root: root,
            audits,
            hash,
        }
    }

    /// Issues `ProposeBlock` to every peer with a 200ms deadline. Any
    /// rejection or RPC failure aborts the round.
    async fn propose(&self, block: &Block) -> bool {
        for peer in &self.peers {
            let response = peer
                .call(Request::ProposeBlock(block.clone()), PROPOSE_DEADLINE)
                .await;
            match response {
                Ok(Response::ProposeBlock(r)) if r.vote => {}
                Ok(Response::ProposeBlock(r)) => {
                    info!(peer = peer.address(), error = ?r.error_message, "propose rejected");
                    return false;
                }
                Ok(other) => {
                    warn!(peer = peer.address(), ?other, "unexpected propose response");
                    return false;
                }
                Err(e) => {
                    warn!(peer = peer.address(), error = %e, "propose RPC failed");
                    return false;
                }
            }
        }
        true
    }

    /// Issues `CommitBlock` to every peer; failures are logged but never
    /// retried (ChainSync is the repair path for a peer that misses one).
    async fn commit(&self, block: &Block) {
        for peer in &self.peers {
            let response = peer
                .call(Request::CommitBlock(block.clone()), COMMIT_DEADLINE)
                .await;
            if let Err(e) = response {
                warn!(peer = peer.address(), error = %e, "commit RPC failed, relying on ChainSync");
            }
        }
    }
}
