//! Membership Network Protocol
//!
//! Defines the peer-list wire format and the Data Transfer Objects (DTOs)
//! used for inter-node membership traffic (peer propagation, key migration).
//!
//! Clients and nodes share one wire format: the same `&&`-joined
//! `host:port` list a client POSTs to `/dht/initialize` is what nodes send
//! each other when propagating membership, and what `GET /dht/peers` answers.

use serde::{Deserialize, Serialize};

use crate::error::DhtResult;
use crate::ring::hash::RingPosition;
use crate::ring::table::NodeId;

// --- API Endpoints ---

/// Internal endpoint applying a batch of key records straight to the local
/// store, bypassing routing. Used by both join and leave migrations; routing
/// a migrated key would bounce it back to the node trying to get rid of it.
pub const ENDPOINT_MIGRATE: &str = "/dht/migrate";
/// Internal endpoint asking a node to hand a range of its keys to a joiner.
pub const ENDPOINT_HANDOFF: &str = "/dht/handoff";
/// Public endpoint answering the current peer list in wire format.
pub const ENDPOINT_PEERS: &str = "/dht/peers";
/// Public endpoint listing a node's local keys.
pub const ENDPOINT_LOCAL_KEYS: &str = "/db";

/// Separator of the `host:port` tokens in a peer-list body.
pub const PEER_LIST_SEPARATOR: &str = "&&";

/// Parses a `&&`-joined `host:port` list, rejecting the whole body on the
/// first malformed token. Duplicates are preserved; callers union.
pub fn parse_peer_list(body: &str) -> DhtResult<Vec<NodeId>> {
    body.trim()
        .split(PEER_LIST_SEPARATOR)
        .map(NodeId::parse)
        .collect()
}

pub fn encode_peer_list<'a>(ids: impl IntoIterator<Item = &'a NodeId>) -> String {
    ids.into_iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(PEER_LIST_SEPARATOR)
}

// --- Data Transfer Objects ---

/// A single key record in a migration batch. Values are opaque bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateEntry {
    pub key: String,
    pub value: Vec<u8>,
}

/// A batch of key records pushed to the node that now owns them.
///
/// The receiver applies the batch to its local store and acknowledges; only
/// then does the sender delete its copies. A failed push leaves the sender's
/// data intact.
#[derive(Debug, Serialize, Deserialize)]
pub struct MigrateRequest {
    /// The node handing the records over.
    pub from: NodeId,
    pub entries: Vec<MigrateEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MigrateResponse {
    /// Number of records applied to the receiving store.
    pub applied: usize,
}

/// Sent by a joiner to the previous owner of its new range.
///
/// The receiver pushes every local key whose position lies in
/// `(lower, upper]` to `target` via [`MigrateRequest`], deletes the records
/// it pushed once acknowledged, and only then answers the handoff.
#[derive(Debug, Serialize, Deserialize)]
pub struct HandoffRequest {
    /// The joining node that should receive the records.
    pub target: NodeId,
    /// Exclusive lower bound of the range (the joiner's predecessor).
    pub lower: RingPosition,
    /// Inclusive upper bound of the range (the joiner's own position).
    pub upper: RingPosition,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HandoffResponse {
    /// Number of records moved to the joiner.
    pub moved: usize,
}
