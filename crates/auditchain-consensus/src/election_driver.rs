use std::sync::Arc;
use std::time::Duration;

use auditchain_cluster::{ElectionState, PeerTable};
use auditchain_rpc::{PeerStub, Request, Response};
use tracing::{info, instrument, warn};

const TRIGGER_ELECTION_DEADLINE: Duration = Duration::from_secs(1);
const NOTIFY_LEADERSHIP_DEADLINE: Duration = Duration::from_secs(1);

/// Startup grace period before the first election attempt, giving peers
/// time to heartbeat and populate the `PeerTable` before anyone declares
/// the incumbent dead.
pub const BOOTSTRAP_GRACE: Duration = Duration::from_secs(30);

/// Detects leader loss and runs a majority-vote election over the static
/// peer set. Term is incremented on candidacy so a stale candidacy can
/// never outrank a fresher one.
pub struct ElectionDriver {
    self_address: String,
    interval: Duration,
    peer_timeout: Duration,
    election: Arc<ElectionState>,
    peer_table: Arc<PeerTable>,
    peers: Vec<Arc<PeerStub>>,
}

impl ElectionDriver {
    pub fn new(
        self_address: String,
        interval: Duration,
        peer_timeout: Duration,
        election: Arc<ElectionState>,
        peer_table: Arc<PeerTable>,
        peers: Vec<Arc<PeerStub>>,
    ) -> Self {
        Self {
            self_address,
            interval,
            peer_timeout,
            election,
            peer_table,
            peers,
        }
    }

    pub async fn run(&self, running: Arc<std::sync::atomic::AtomicBool>) {
        use std::sync::atomic::Ordering;

        tokio::time::sleep(BOOTSTRAP_GRACE).await;

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
        self.peer_table.sweep(self.peer_timeout).await;

        if !self.needs_election().await {
            return;
        }

        self.run_election().await;
    }

    async fn needs_election(&self) -> bool {
        match self.election.current_leader().await {
            None => true,
            Some(leader) => match self.peer_table.get(&leader).await {
                Some(entry) => !entry.alive,
                None => false,
            },
        }
    }

    #[instrument(skip(self))]
    async fn run_election(&self) {
        let term = self.election.become_candidate(&self.self_address).await;
        let cluster_size = self.peers.len() + 1; // peers excludes self
        let majority = cluster_size / 2 + 1;
        let mut votes = 1; // self-vote

        for peer in &self.peers {
            let request = Request::TriggerElection {
                term,
                candidate_address: self.self_address.clone(),
            };
            match peer.call(request, TRIGGER_ELECTION_DEADLINE).await {
                Ok(Response::TriggerElection(r)) if r.vote => votes += 1,
                Ok(Response::TriggerElection(_)) => {}
                Ok(other) => warn!(peer = peer.address(), ?other, "unexpected election response"),
                Err(e) => warn!(peer = peer.address(), error = %e, "TriggerElection RPC failed"),
            }
        }

        if votes >= majority {
            self.election.set_leader(self.self_address.clone()).await;
            info!(term, votes, majority, "won election");
            self.broadcast_leadership().await;
        } else {
            info!(term, votes, majority, "lost election");
        }
    }

    async fn broadcast_leadership(&self) {
        for peer in &self.peers {
            let request = Request::NotifyLeadership {
                new_leader: self.self_address.clone(),
            };
            if let Err(e) = peer.call(request, NOTIFY_LEADERSHIP_DEADLINE).await {
                warn!(peer = peer.address(), error = %e, "NotifyLeadership RPC failed");
            }
        }
    }
}
