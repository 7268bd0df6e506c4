//! # auditchain-rpc: wire framing and the inter-replica RPC surface
//!
//! Request/response message types for the eight calls a replica makes to
//! its peers (`SubmitAudit`, `WhisperAuditRequest`, `ProposeBlock`,
//! `CommitBlock`, `GetBlock`, `SendHeartbeat`, `TriggerElection`,
//! `NotifyLeadership`), a length-prefixed `postcard` framing codec over any
//! async byte stream, a [`LedgerService`] trait the server implements, and a
//! [`PeerStub`] client that dials peers once and reuses the connection with
//! per-call deadlines.
//!
//! There is no protocol version negotiation and no TLS here: the peer set
//! is static configuration (`peers.json`), not a discovered, adversarial
//! population.

mod client;
mod codec;
mod messages;

pub use client::PeerStub;
pub use codec::{RpcError, Result, read_frame, write_frame};
pub use messages::{
    CommitBlockResponse, GetBlockResponse, ProposeBlockResponse, Request, Response, Status,
    SubmitAuditResponse, TriggerElectionResponse,
};

use async_trait::async_trait;

/// Server-side implementation of the eight RPC methods. A dispatcher built
/// on top of this trait decodes frames and routes them to these methods;
/// see `auditchain-consensus`/`auditchain-server` for the dispatcher.
#[async_trait]
pub trait LedgerService: Send + Sync {
    async fn submit_audit(&self, audit: auditchain_types::Audit) -> SubmitAuditResponse;

    async fn whisper_audit_request(&self, audit: auditchain_types::Audit) -> Status;

    async fn propose_block(&self, block: auditchain_types::Block) -> ProposeBlockResponse;

    async fn commit_block(&self, block: auditchain_types::Block) -> CommitBlockResponse;

    async fn get_block(&self, id: i64) -> GetBlockResponse;

    async fn send_heartbeat(
        &self,
        from_address: String,
        leader: Option<String>,
        latest_block_id: i64,
        mempool_size: usize,
    );

    async fn trigger_election(&self, term: i64, candidate_address: String)
    -> TriggerElectionResponse;

    async fn notify_leadership(&self, new_leader: String);

    /// Dispatches a decoded [`Request`] to the matching method above.
    /// The single place that turns the wire enum into trait calls.
    async fn dispatch(&self, request: Request) -> Response {
        match request {
            Request::SubmitAudit(audit) => Response::SubmitAudit(self.submit_audit(audit).await),
            Request::WhisperAuditRequest(audit) => {
                Response::WhisperAuditRequest(self.whisper_audit_request(audit).await)
            }
            Request::ProposeBlock(block) => Response::ProposeBlock(self.propose_block(block).await),
            Request::CommitBlock(block) => Response::CommitBlock(self.commit_block(block).await),
            Request::GetBlock { id } => Response::GetBlock(self.get_block(id).await),
            Request::SendHeartbeat {
                from_address,
                leader,
                latest_block_id,
                mempool_size,
            } => {
                self.send_heartbeat(from_address, leader, latest_block_id, mempool_size)
                    .await;
                Response::SendHeartbeat
            }
            Request::TriggerElection {
                term,
                candidate_address,
            } => Response::TriggerElection(self.trigger_election(term, candidate_address).await),
            Request::NotifyLeadership { new_leader } => {
                self.notify_leadership(new_leader).await;
                Response::NotifyLeadership
            }
        }
    }
}
