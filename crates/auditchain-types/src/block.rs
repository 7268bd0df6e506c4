use serde::{Deserialize, Serialize};

use crate::audit::{Audit, canonical_json};
use crate::hash::sha256_hex;

/// Projection of a [`Block`] kept in the chain index; the full audit
/// payload is written out as a side artifact per block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    pub id: i64,
    pub hash: String,
    pub previous_hash: String,
    pub merkle_root: String,
}

/// A committed batch of audits, cryptographically linked to its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: i64,
    pub previous_hash: String,
    pub merkle_root: String,
    pub audits: Vec<Audit>,
    pub hash: String,
}

impl Block {
    pub fn meta(&self) -> BlockMeta {
        BlockMeta {
            id: self.id,
            hash: self.hash.clone(),
            previous_hash: self.previous_hash.clone(),
            merkle_root: self.merkle_root.clone(),
        }
    }
}

/// SHA-256 of an audit's canonical JSON payload — the Merkle leaf.
pub fn leaf_hash(audit: &Audit) -> String {
    sha256_hex(canonical_json(audit).as_bytes())
}

/// Merkle root over leaf hashes. Empty input yields the empty string;
/// odd levels duplicate their last element before pairing.
pub fn merkle_root(leaves: &[String]) -> String {
    if leaves.is_empty() {
        return String::new();
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = if pair.len() == 2 { &pair[1] } else { &pair[0] };
            next.push(sha256_hex(format!("{left}{right}").as_bytes()));
        }
        level = next;
    }
    level.into_iter().next().expect("non-empty level")
}

/// `SHA256(decimal(id) ∥ previous_hash ∥ merkle_root ∥ concat(canonicalJSON(a)))`.
pub fn block_hash(id: i64, previous_hash: &str, merkle_root: &str, audits: &[Audit]) -> String {
    let mut buf = String::new();
    buf.push_str(&id.to_string());
    buf.push_str(previous_hash);
    buf.push_str(merkle_root);
    for audit in audits {
        buf.push_str(&canonical_json(audit));
    }
    sha256_hex(buf.as_bytes())
}
