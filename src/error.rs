use thiserror::Error;

use crate::ring::table::NodeId;

/// Error taxonomy shared by every core component.
///
/// Nothing here is allowed to crash the process: local store misses become
/// `NotFound`, failed peer round trips become `PeerUnreachable`, and all
/// variants are mapped to HTTP statuses at the transport boundary.
#[derive(Debug, Error)]
pub enum DhtError {
    /// The key is absent from the owning store.
    #[error("key not found")]
    NotFound,

    /// A forward or migration call to a peer timed out or failed to connect.
    #[error("peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: NodeId, reason: String },

    /// Unparseable client input (peer list body, range bounds, node address).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Two peers disagree about ring ownership, or two distinct addresses
    /// hashed to the same ring position.
    #[error("ring inconsistency: {0}")]
    RingInconsistency(String),

    /// The operation is not legal in the node's current membership phase.
    #[error("invalid node state: {0}")]
    InvalidState(String),
}

pub type DhtResult<T> = Result<T, DhtError>;
