use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{DhtError, DhtResult};
use crate::membership::controller::NodeIdentity;
use crate::ring::hash::{HashRing, RingPosition, in_keyspace_range};
use crate::ring::table::{Peer, PeerTable};
use crate::routing::client::PeerClient;
use crate::storage::memory::LocalStore;

/// Routes key operations: serve from the local store when this node owns the
/// key's ring position, otherwise forward one hop to the owning peer and
/// relay its response verbatim.
pub struct KeyRouter {
    ring: HashRing,
    peers: Arc<PeerTable>,
    store: Arc<LocalStore>,
    client: Arc<PeerClient>,
    identity: Arc<NodeIdentity>,
}

impl KeyRouter {
    pub fn new(
        ring: HashRing,
        peers: Arc<PeerTable>,
        store: Arc<LocalStore>,
        client: Arc<PeerClient>,
        identity: Arc<NodeIdentity>,
    ) -> Self {
        Self {
            ring,
            peers,
            store,
            client,
            identity,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// The owning peer for `key`, or `None` when that is this node.
    ///
    /// Recomputed from the current peer table on every call so routing always
    /// reflects the latest known topology. The decision is snapshotted here;
    /// no table lock is held during the subsequent network call.
    ///
    /// `forwarded` marks requests that already took their one allowed hop: if
    /// such a request still does not land on its owner, the tables of two
    /// nodes disagree and the request must not keep bouncing.
    fn route(&self, key: &str, forwarded: bool) -> DhtResult<Option<Peer>> {
        let myself = self.identity.require()?;
        let position = self.ring.position_of(key);
        let owner = self
            .peers
            .owner_of(position)
            .ok_or_else(|| DhtError::InvalidState("peer table is empty".to_string()))?;

        if owner.id == myself.id {
            return Ok(None);
        }
        if forwarded {
            tracing::error!(
                key,
                position,
                owner = %owner.id,
                "forwarded request does not belong here; peer tables disagree"
            );
            return Err(DhtError::RingInconsistency(format!(
                "forwarded request for position {position} bounced between nodes"
            )));
        }
        Ok(Some(owner))
    }

    pub async fn get(&self, key: &str, forwarded: bool) -> DhtResult<Vec<u8>> {
        match self.route(key, forwarded)? {
            None => self.store.get(key).ok_or(DhtError::NotFound),
            Some(owner) => {
                tracing::debug!(key, owner = %owner.id, "forwarding get");
                self.client.get_key(&owner.id, key).await
            }
        }
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, forwarded: bool) -> DhtResult<()> {
        match self.route(key, forwarded)? {
            None => {
                self.store.set(key.to_string(), value);
                Ok(())
            }
            Some(owner) => {
                tracing::debug!(key, owner = %owner.id, "forwarding set");
                self.client.put_key(&owner.id, key, value).await
            }
        }
    }

    pub async fn delete(&self, key: &str, forwarded: bool) -> DhtResult<()> {
        match self.route(key, forwarded)? {
            None => match self.store.delete(key) {
                Some(_) => Ok(()),
                None => Err(DhtError::NotFound),
            },
            Some(owner) => {
                tracing::debug!(key, owner = %owner.id, "forwarding delete");
                self.client.delete_key(&owner.id, key).await
            }
        }
    }

    /// Union of every reachable peer's local keys. Peers that cannot be
    /// reached are skipped with a warning; without replication their keys are
    /// gone anyway.
    pub async fn network_keys(&self) -> DhtResult<Vec<String>> {
        let myself = self.identity.require()?;
        let peers = self.peers.all_peers();

        let mut keys: BTreeSet<String> = self.store.keys().into_iter().collect();
        for peer in peers {
            if peer.id == myself.id {
                continue;
            }
            match self.client.local_keys(&peer.id).await {
                Ok(peer_keys) => keys.extend(peer_keys),
                Err(e) => tracing::warn!(peer = %peer.id, "skipping peer in key fan-out: {e}"),
            }
        }
        Ok(keys.into_iter().collect())
    }

    /// Network keys whose hashed position lies in `[lower, upper]`, both ends
    /// inclusive, wrapping when `lower > upper`. Bounds outside `[0, ring
    /// size)` are not positions and are rejected rather than silently
    /// matching nothing.
    pub async fn keyspace_range(
        &self,
        lower: RingPosition,
        upper: RingPosition,
    ) -> DhtResult<Vec<String>> {
        for bound in [lower, upper] {
            if bound >= self.ring.size() {
                return Err(DhtError::MalformedInput(format!(
                    "bound {bound} is outside the ring of size {}",
                    self.ring.size()
                )));
            }
        }
        let keys = self.network_keys().await?;
        Ok(keys
            .into_iter()
            .filter(|key| in_keyspace_range(self.ring.position_of(key), lower, upper))
            .collect())
    }
}
