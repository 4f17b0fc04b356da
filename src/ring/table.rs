use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use super::hash::RingPosition;
use crate::error::{DhtError, DhtResult};

/// A node's external `host:port` address. Doubles as its identity: the
/// address string is what gets hashed onto the ring, so it must not change
/// for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Parses and validates a `host:port` token.
    pub fn parse(token: &str) -> DhtResult<Self> {
        let token = token.trim();
        let (host, port) = token
            .rsplit_once(':')
            .ok_or_else(|| DhtError::MalformedInput(format!("missing port in '{token}'")))?;
        if host.is_empty() {
            return Err(DhtError::MalformedInput(format!("missing host in '{token}'")));
        }
        port.parse::<u16>()
            .map_err(|_| DhtError::MalformedInput(format!("bad port in '{token}'")))?;
        Ok(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = DhtError;

    fn from_str(s: &str) -> DhtResult<Self> {
        Self::parse(s)
    }
}

/// One member of the network as this node sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: NodeId,
    pub position: RingPosition,
}

/// The node's view of the membership, keyed by ring position so that
/// ownership lookups are a single ordered-map walk.
///
/// All mutation goes through a write lock; readers take snapshots before any
/// network call so the lock is never held across a round trip.
pub struct PeerTable {
    peers: RwLock<BTreeMap<RingPosition, Peer>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Inserts a peer. Idempotent: re-adding an identical peer is a no-op.
    /// Two distinct addresses on one position is a configuration error the
    /// protocol does not try to resolve.
    ///
    /// Returns `true` if the table changed.
    pub fn add_peer(&self, peer: Peer) -> DhtResult<bool> {
        let mut peers = self.peers.write().expect("peer table lock poisoned");
        if let Some(existing) = peers.get(&peer.position) {
            if existing.id == peer.id {
                return Ok(false);
            }
            return Err(DhtError::RingInconsistency(format!(
                "peers {} and {} both hash to position {}",
                existing.id, peer.id, peer.position
            )));
        }
        peers.insert(peer.position, peer);
        Ok(true)
    }

    /// Removes a peer by id. Idempotent: removing an absent peer is a no-op.
    ///
    /// Returns `true` if the table changed.
    pub fn remove_peer(&self, id: &NodeId) -> bool {
        let mut peers = self.peers.write().expect("peer table lock poisoned");
        let position = peers
            .iter()
            .find(|(_, peer)| &peer.id == id)
            .map(|(position, _)| *position);
        match position {
            Some(position) => {
                peers.remove(&position);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        let peers = self.peers.read().expect("peer table lock poisoned");
        peers.values().any(|peer| &peer.id == id)
    }

    pub fn len(&self) -> usize {
        self.peers.read().expect("peer table lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All known peers in ring order, this node included.
    pub fn all_peers(&self) -> Vec<Peer> {
        let peers = self.peers.read().expect("peer table lock poisoned");
        peers.values().cloned().collect()
    }

    /// The peer owning `position`: the first peer at or after it in ring
    /// order, wrapping to the minimum-position peer. `None` only while the
    /// table is empty (before the node learns its own identity).
    pub fn owner_of(&self, position: RingPosition) -> Option<Peer> {
        let peers = self.peers.read().expect("peer table lock poisoned");
        peers
            .range(position..)
            .next()
            .or_else(|| peers.iter().next())
            .map(|(_, peer)| peer.clone())
    }

    /// The peer immediately before `peer` in ring order, wrapping at the
    /// boundary. A sole peer is its own predecessor (it owns the whole ring).
    pub fn predecessor_of(&self, peer: &Peer) -> Option<Peer> {
        let peers = self.peers.read().expect("peer table lock poisoned");
        peers
            .range(..peer.position)
            .next_back()
            .or_else(|| peers.iter().next_back())
            .map(|(_, peer)| peer.clone())
    }

    /// The peer immediately after `peer` in ring order, excluding `peer`
    /// itself. `None` when there is no other peer. This is the peer that
    /// inherits `peer`'s range when it leaves.
    pub fn successor_of(&self, peer: &Peer) -> Option<Peer> {
        use std::ops::Bound;
        let peers = self.peers.read().expect("peer table lock poisoned");
        peers
            .range((Bound::Excluded(peer.position), Bound::Unbounded))
            .next()
            .or_else(|| peers.iter().next())
            .map(|(_, found)| found.clone())
            .filter(|found| found.id != peer.id)
    }

    /// Copy of the full table, used to restore state when a membership
    /// operation aborts partway.
    pub fn checkpoint(&self) -> BTreeMap<RingPosition, Peer> {
        self.peers.read().expect("peer table lock poisoned").clone()
    }

    pub fn restore(&self, checkpoint: BTreeMap<RingPosition, Peer>) {
        *self.peers.write().expect("peer table lock poisoned") = checkpoint;
    }
}

impl Default for PeerTable {
    fn default() -> Self {
        Self::new()
    }
}
