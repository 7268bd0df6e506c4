use auditchain_types::{Audit, Block};
use serde::{Deserialize, Serialize};

/// Generic outcome used across several responses rather than a richer
/// error enum: callers match on `Status::Success`/`Status::Failure(reason)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Success,
    Failure(String),
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAuditResponse {
    pub req_id: String,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeBlockResponse {
    pub vote: bool,
    pub status: Status,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitBlockResponse {
    pub status: Status,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBlockResponse {
    pub block: Option<Block>,
    pub status: Status,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerElectionResponse {
    pub vote: bool,
}

/// The eight calls a replica issues to a peer. One variant per method,
/// with field names matching that method's documented signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    SubmitAudit(Audit),
    WhisperAuditRequest(Audit),
    ProposeBlock(Block),
    CommitBlock(Block),
    GetBlock {
        id: i64,
    },
    SendHeartbeat {
        from_address: String,
        leader: Option<String>,
        latest_block_id: i64,
        mempool_size: usize,
    },
    TriggerElection {
        term: i64,
        candidate_address: String,
    },
    NotifyLeadership {
        new_leader: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    SubmitAudit(SubmitAuditResponse),
    WhisperAuditRequest(Status),
    ProposeBlock(ProposeBlockResponse),
    CommitBlock(CommitBlockResponse),
    GetBlock(GetBlockResponse),
    SendHeartbeat,
    TriggerElection(TriggerElectionResponse),
    NotifyLeadership,
}
