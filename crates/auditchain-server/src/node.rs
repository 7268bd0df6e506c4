use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use auditchain_cluster::{ElectionState, PeerTable, load_leader_config, load_peers};
use auditchain_consensus::{BlockScheduler, ElectionDriver, HeartbeatDriver, Ledger};
use auditchain_rpc::PeerStub;
use auditchain_storage::{ChainStore, Mempool};
use tokio::net::TcpListener;
use tracing::info;

use crate::error::{Result, StartupError};

/// Production defaults; not currently exposed as CLI flags since the wire
/// protocol and config files carry no slot for them.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const PEER_TIMEOUT: Duration = Duration::from_secs(15);
const ELECTION_INTERVAL: Duration = Duration::from_secs(2);

/// Everything needed to run one replica: the bound listener, the shared
/// [`Ledger`], and the three driver handles to spawn.
pub struct Node {
    pub listener: TcpListener,
    pub ledger: Arc<Ledger>,
    pub scheduler: BlockScheduler,
    pub heartbeat: HeartbeatDriver,
    pub election: ElectionDriver,
}

/// Loads `peers.json` and `leader.json` from the current directory, opens
/// `chain.json`/`mempool.dat`, binds `listen_addr`, and assembles the three
/// drivers. Returns a [`StartupError`] for any fatal configuration or bind
/// failure — a missing or malformed `leader.json` is fatal at startup.
pub async fn assemble(listen_addr: &str) -> Result<Node> {
    let peer_addresses = load_peers("peers.json")?;
    let leader_config = load_leader_config("leader.json")?;

    info!(
        self_address = listen_addr,
        leader_addr = %leader_config.leader_addr,
        peer_count = peer_addresses.len(),
        "loaded cluster configuration"
    );

    let mempool = Arc::new(Mempool::new(Path::new("mempool.dat")));
    let chain = Arc::new(ChainStore::open(Path::new("chain.json")));
    let peer_table = Arc::new(PeerTable::new());
    let election = Arc::new(ElectionState::new());

    if listen_addr == leader_config.leader_addr {
        election.set_leader(leader_config.leader_addr.clone()).await;
    }

    let peer_stubs: Vec<Arc<PeerStub>> = peer_addresses
        .iter()
        .map(|addr| Arc::new(PeerStub::new(addr.clone())))
        .collect();

    let ledger = Arc::new(Ledger::new(
        mempool.clone(),
        chain.clone(),
        peer_table.clone(),
        election.clone(),
        peer_stubs.clone(),
        "blocks",
    ));

    let listener =
        TcpListener::bind(listen_addr)
            .await
            .map_err(|source| StartupError::Bind {
                addr: listen_addr.to_string(),
                source,
            })?;

    let scheduler = BlockScheduler::new(
        listen_addr.to_string(),
        mempool,
        chain,
        election.clone(),
        ledger.clone(),
        peer_stubs.clone(),
        leader_config.batch_size,
        leader_config.batch_interval,
    );

    let heartbeat = HeartbeatDriver::new(
        listen_addr.to_string(),
        HEARTBEAT_INTERVAL,
        PEER_TIMEOUT,
        election.clone(),
        peer_table.clone(),
        ledger.clone(),
        peer_stubs.clone(),
    );

    let election_driver = ElectionDriver::new(
        listen_addr.to_string(),
        ELECTION_INTERVAL,
        PEER_TIMEOUT,
        election,
        peer_table,
        peer_stubs,
    );

    Ok(Node {
        listener,
        ledger,
        scheduler,
        heartbeat,
        election: election_driver,
    })
}

impl Node {
    /// Spawns the listener and all three drivers, returning once every
    /// task has exited (i.e. after `running` is flipped to false and each
    /// loop observes it at its next iteration).
    pub async fn run_until_shutdown(self, running: Arc<AtomicBool>) {
        let listener_task = tokio::spawn(crate::listener::serve(
            self.listener,
            self.ledger.clone() as Arc<dyn auditchain_rpc::LedgerService>,
            running.clone(),
        ));

        let scheduler = Arc::new(self.scheduler);
        let heartbeat = Arc::new(self.heartbeat);
        let election = Arc::new(self.election);

        let scheduler_task = {
            let scheduler = scheduler.clone();
            let running = running.clone();
            tokio::spawn(async move { scheduler.run(running).await })
        };
        let heartbeat_task = {
            let heartbeat = heartbeat.clone();
            let running = running.clone();
            tokio::spawn(async move { heartbeat.run(running).await })
        };
        let election_task = {
            let election = election.clone();
            let running = running.clone();
            tokio::spawn(async move { election.run(running).await })
        };

        let _ = tokio::join!(
            listener_task,
            scheduler_task,
            heartbeat_task,
            election_task
        );
    }
}
