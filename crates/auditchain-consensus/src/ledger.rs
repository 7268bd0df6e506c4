use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auditchain_cluster::{ElectionState, PeerTable};
use auditchain_crypto::verify_audit;
use auditchain_rpc::{
    CommitBlockResponse, GetBlockResponse, LedgerService, PeerStub, ProposeBlockResponse, Request,
    Response, Status, SubmitAuditResponse, TriggerElectionResponse,
};
use auditchain_storage::{ChainStore, Mempool};
use auditchain_types::{Audit, Block, leaf_hash, merkle_root};
use tracing::{instrument, warn};

/// Deadline for the outbound `WhisperAuditRequest` gossip fan-out. Not
/// named explicitly alongside propose/commit's 200ms or heartbeat's 1s, so
/// treated as the same class of per-audit RPC as propose/commit rather than
/// a periodic driver call (see DESIGN.md).
const GOSSIP_DEADLINE: Duration = Duration::from_millis(200);

/// Server-side implementation of the eight RPC methods, wired directly to
/// [`Mempool`], [`ChainStore`], [`PeerTable`], and [`ElectionState`]. This
/// is the single place where inbound frames touch durable state — drivers
/// (scheduler, heartbeat, election) call these same methods locally rather
/// than looping back through the network.
pub struct Ledger {
    mempool: Arc<Mempool>,
    chain: Arc<ChainStore>,
    peers: Arc<PeerTable>,
    election: Arc<ElectionState>,
    peer_stubs: Vec<Arc<PeerStub>>,
    blocks_dir: PathBuf,
}

impl Ledger {
    pub fn new(
        mempool: Arc<Mempool>,
        chain: Arc<ChainStore>,
        peers: Arc<PeerTable>,
        election: Arc<ElectionState>,
        peer_stubs: Vec<Arc<PeerStub>>,
        blocks_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            mempool,
            chain,
            peers,
            election,
            peer_stubs,
            blocks_dir: blocks_dir.into(),
        }
    }

    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    pub fn chain(&self) -> &Arc<ChainStore> {
        &self.chain
    }

    pub fn election(&self) -> &Arc<ElectionState> {
        &self.election
    }

    /// Writes `blocks/block_<id>.json`, creating the directory lazily.
    /// Shared by local leader commit, follower `CommitBlock`, and ChainSync.
    #[instrument(skip(self, block), fields(id = block.id))]
    pub async fn write_block_artifact(&self, block: &Block) -> crate::Result<()> {
        tokio::fs::create_dir_all(&self.blocks_dir).await?;
        let path = self.blocks_dir.join(format!("block_{}.json", block.id));
        let json = serde_json::to_string_pretty(block)
            .expect("Block serialization is infallible for well-formed structs");
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Appends a committed block to the chain, prunes its audits from the
    /// mempool, and writes the artifact. Used for local leader commit,
    /// follower `CommitBlock`, and ChainSync catch-up.
    #[instrument(skip(self, block), fields(id = block.id))]
    pub async fn commit_locally(&self, block: &Block) -> crate::Result<()> {
        let req_ids = block.audits.iter().map(|a| a.req_id.clone()).collect();
        self.chain.append(block.meta()).await?;
        self.mempool.remove_batch(&req_ids).await;
        self.write_block_artifact(block).await
    }

    /// Recomputes Merkle root and per-audit signatures for `block`,
    /// returning `Ok(())` or the first validation failure as a diagnostic
    /// string, checked in `Propose` validation order: Merkle root, then
    /// previous-hash linkage, then each audit's signature.
    fn validate_proposal(&self, block: &Block, last_hash: &str) -> Result<(), String> {
        let leaves: Vec<String> = block.audits.iter().map(leaf_hash).collect();
        let recomputed_root = merkle_root(&leaves);
        if recomputed_root != block.merkle_root {
            return Err("bad merkle_root".to_string());
        }

        if block.previous_hash != last_hash {
            return Err("bad previous_hash".to_string());
        }

        for audit in &block.audits {
            if !verify_audit(audit) {
                return Err(format!("invalid audit signature: {}", audit.req_id));
            }
        }

        Ok(())
    }

    /// Fans a freshly-accepted audit out to every peer via
    /// `WhisperAuditRequest`. Best-effort: a peer that times out or errors
    /// is logged and otherwise ignored, since the client already has a
    /// successful `SubmitAudit` and ChainSync/re-submission are the
    /// eventual-consistency backstops, not this call.
    #[instrument(skip(self, audit), fields(req_id = %audit.req_id))]
    async fn gossip(&self, audit: &Audit) {
        for peer in &self.peer_stubs {
            let response = peer
                .call(Request::WhisperAuditRequest(audit.clone()), GOSSIP_DEADLINE)
                .await;
            match response {
                Ok(Response::WhisperAuditRequest(status)) if status.is_success() => {}
                Ok(Response::WhisperAuditRequest(status)) => {
                    warn!(peer = peer.address(), ?status, "gossip rejected");
                }
                Ok(other) => {
                    warn!(peer = peer.address(), ?other, "unexpected gossip response");
                }
                Err(e) => {
                    warn!(peer = peer.address(), error = %e, "gossip RPC failed");
                }
            }
        }
    }
}

#[async_trait]
impl LedgerService for Ledger {
    #[instrument(skip(self, audit), fields(req_id = %audit.req_id))]
    async fn submit_audit(&self, audit: Audit) -> SubmitAuditResponse {
        let req_id = audit.req_id.clone();
        if !verify_audit(&audit) {
            return SubmitAuditResponse {
                req_id,
                status: Status::Failure("invalid signature".to_string()),
            };
        }
        self.mempool.append(&audit).await;
        self.gossip(&audit).await;
        SubmitAuditResponse {
            req_id,
            status: Status::Success,
        }
    }

    #[instrument(skip(self, audit), fields(req_id = %audit.req_id))]
    async fn whisper_audit_request(&self, audit: Audit) -> Status {
        if !verify_audit(&audit) {
            return Status::Failure("invalid signature".to_string());
        }
        self.mempool.append(&audit).await;
        Status::Success
    }

    #[instrument(skip(self, block), fields(id = block.id))]
    async fn propose_block(&self, block: Block) -> ProposeBlockResponse {
        let last_hash = self.chain.get_last_hash().await;
        match self.validate_proposal(&block, &last_hash) {
            Ok(()) => ProposeBlockResponse {
                vote: true,
                status: Status::Success,
                error_message: None,
            },
            Err(reason) => ProposeBlockResponse {
                vote: false,
                status: Status::Failure(reason.clone()),
                error_message: Some(reason),
            },
        }
    }

    #[instrument(skip(self, block), fields(id = block.id))]
    async fn commit_block(&self, block: Block) -> CommitBlockResponse {
        match self.commit_locally(&block).await {
            Ok(()) => CommitBlockResponse {
                status: Status::Success,
                error_message: None,
            },
            Err(e) => CommitBlockResponse {
                status: Status::Failure(e.to_string()),
                error_message: Some(e.to_string()),
            },
        }
    }

    #[instrument(skip(self))]
    async fn get_block(&self, id: i64) -> GetBlockResponse {
        match self.chain.get(id).await {
            Some(meta) => match self.read_block_artifact(meta.id).await {
                Ok(block) => GetBlockResponse {
                    block: Some(block),
                    status: Status::Success,
                    error_message: None,
                },
                Err(e) => GetBlockResponse {
                    block: None,
                    status: Status::Failure(e.to_string()),
                    error_message: Some(e.to_string()),
                },
            },
            None => GetBlockResponse {
                block: None,
                status: Status::Failure("unknown block id".to_string()),
                error_message: None,
            },
        }
    }

    #[instrument(skip(self), fields(from = %from_address))]
    async fn send_heartbeat(
        &self,
        from_address: String,
        leader: Option<String>,
        latest_block_id: i64,
        mempool_size: usize,
    ) {
        self.peers
            .update(&from_address, leader, latest_block_id, mempool_size)
            .await;
    }

    #[instrument(skip(self))]
    async fn trigger_election(&self, term: i64, candidate_address: String) -> TriggerElectionResponse {
        let vote = self.election.try_vote(term, &candidate_address).await;
        TriggerElectionResponse { vote }
    }

    #[instrument(skip(self))]
    async fn notify_leadership(&self, new_leader: String) {
        self.election.set_leader(new_leader).await;
    }
}

impl Ledger {
    async fn read_block_artifact(&self, id: i64) -> crate::Result<Block> {
        let path = self.blocks_dir.join(format!("block_{id}.json"));
        let bytes = tokio::fs::read(path).await?;
        serde_json::from_slice(&bytes)
            .map_err(crate::ConsensusError::CorruptArtifact)
            .inspect_err(|e| warn!(id, error = %e, "corrupt block artifact"))
    }
}
