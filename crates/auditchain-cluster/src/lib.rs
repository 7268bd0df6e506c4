//! # auditchain-cluster: membership, liveness, and election state
//!
//! Loads the static peer set and leader-batching config from JSON, tracks
//! per-peer liveness in [`PeerTable`], and holds the process-wide election
//! triple in [`ElectionState`]. No networking lives here — drivers in
//! `auditchain-consensus` own the RPC fan-out.

mod config;
mod election_state;
mod error;
mod peer_table;

pub use config::{LeaderConfig, load_leader_config, load_peers};
pub use election_state::ElectionState;
pub use error::{Error, Result};
pub use peer_table::{PeerEntry, PeerTable};
