use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::protocol::{
    HandoffRequest, MigrateEntry, MigrateRequest, encode_peer_list, parse_peer_list,
};
use crate::error::{DhtError, DhtResult};
use crate::ring::hash::{HashRing, in_ownership_range};
use crate::ring::table::{NodeId, Peer, PeerTable};
use crate::routing::client::PeerClient;
use crate::storage::memory::LocalStore;

/// Membership lifecycle of a node. `Left` is terminal: a node that left the
/// ring stops serving key and membership traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not yet part of any ring.
    Unconfigured,
    /// Bootstrapped a ring it is the only member of.
    Standalone,
    /// Part of a ring with other members.
    Member,
    /// Draining its keys to the successor; key traffic is refused so no
    /// write can slip in behind the drain and vanish.
    Leaving,
    /// Departed after handing its keys to its successor.
    Left,
}

/// The node's own address and ring position.
///
/// A node may start without knowing the address it is reachable under; it
/// learns it from the `Host` header of the first inbound request, or eagerly
/// from configuration. Once set, the identity and with it the ring position
/// are fixed for the process lifetime.
pub struct NodeIdentity {
    ring: HashRing,
    myself: OnceLock<Peer>,
}

impl NodeIdentity {
    pub fn new(ring: HashRing) -> Self {
        Self {
            ring,
            myself: OnceLock::new(),
        }
    }

    /// Fixes the identity to `id` unless one is already set. Returns the
    /// effective identity either way (first writer wins).
    pub fn configure(&self, id: NodeId) -> Peer {
        let position = self.ring.position_of(id.as_str());
        self.myself.get_or_init(|| Peer { id, position }).clone()
    }

    pub fn get(&self) -> Option<&Peer> {
        self.myself.get()
    }

    pub fn require(&self) -> DhtResult<Peer> {
        self.myself.get().cloned().ok_or_else(|| {
            DhtError::InvalidState("node does not know its own address yet".to_string())
        })
    }
}

/// Orchestrates the initialize / join / leave / add-peers protocols.
///
/// The only component that mutates the peer table or bulk-moves key records.
/// Membership operations are serialized by one async lock so two of them can
/// never interleave their table updates and migrations; the peer table itself
/// stays readable throughout.
pub struct MembershipController {
    ring: HashRing,
    peers: Arc<PeerTable>,
    store: Arc<LocalStore>,
    client: Arc<PeerClient>,
    identity: Arc<NodeIdentity>,
    phase: RwLock<Phase>,
    op_lock: Mutex<()>,
}

impl MembershipController {
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
            phase: RwLock::new(Phase::Unconfigured),
            op_lock: Mutex::new(()),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.read().expect("phase lock poisoned")
    }

    fn set_phase(&self, phase: Phase) {
        *self.phase.write().expect("phase lock poisoned") = phase;
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Guard for key and membership traffic on a node that is leaving or
    /// already left.
    pub fn ensure_serving(&self) -> DhtResult<()> {
        match self.phase() {
            Phase::Leaving => Err(DhtError::InvalidState(
                "node is handing its keys over before leaving".to_string(),
            )),
            Phase::Left => Err(DhtError::InvalidState(
                "node has left the network".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Completes setup from the `Host` header of an inbound request. Quietly
    /// ignores headers that are not a usable `host:port` pair; identity can
    /// still be fixed by a later request or explicit configuration.
    pub fn finish_setup_from_host(&self, host: &str) {
        if self.identity.get().is_some() {
            return;
        }
        match NodeId::parse(host) {
            Ok(id) => {
                self.configure(id);
            }
            Err(e) => debug!("host header '{host}' not usable as identity: {e}"),
        }
    }

    /// Fixes the node's identity and places it on the ring.
    pub fn configure(&self, id: NodeId) -> Peer {
        let myself = self.identity.configure(id);
        match self.peers.add_peer(myself.clone()) {
            Ok(true) => info!(id = %myself.id, position = myself.position, "node identity fixed"),
            Ok(false) => {}
            // Only possible if another address already sits on our position.
            Err(e) => warn!("could not place own identity on ring: {e}"),
        }
        myself
    }

    /// Bootstraps a brand-new ring from a `&&`-joined peer list.
    ///
    /// Builds the full peer table locally (no prior owner exists for any key,
    /// so nothing migrates) and instructs every listed peer to adopt the same
    /// table. Any unreachable peer aborts the bootstrap and restores the
    /// table, per the no-partial-commit rule.
    pub async fn initialize(&self, peer_list: &str) -> DhtResult<Vec<Peer>> {
        let _guard = self.op_lock.lock().await;
        let myself = self.identity.require()?;
        if self.phase() != Phase::Unconfigured {
            return Err(DhtError::InvalidState(
                "node is already part of a network".to_string(),
            ));
        }

        let ids = parse_peer_list(peer_list)?;
        let checkpoint = self.peers.checkpoint();

        for id in &ids {
            let peer = Peer {
                id: id.clone(),
                position: self.ring.position_of(id.as_str()),
            };
            if let Err(e) = self.peers.add_peer(peer) {
                self.peers.restore(checkpoint);
                return Err(e);
            }
        }

        let members = self.peers.all_peers();
        let wire = encode_peer_list(members.iter().map(|peer| &peer.id));
        for peer in &members {
            if peer.id == myself.id {
                continue;
            }
            if let Err(e) = self.client.add_peers(&peer.id, wire.clone()).await {
                warn!(peer = %peer.id, "bootstrap aborted: {e}");
                self.peers.restore(checkpoint);
                return Err(e);
            }
        }

        let phase = if members.len() > 1 {
            Phase::Member
        } else {
            Phase::Standalone
        };
        self.set_phase(phase);
        info!(members = members.len(), "initialized new ring");
        Ok(members)
    }

    /// Attaches this node to a running ring via one or more known contacts.
    ///
    /// Pulls the current peer table from the first reachable contact, inserts
    /// itself, and asks the previous owner of its new range to hand those
    /// keys over. Only once the keys have arrived does the joiner announce
    /// itself to the rest of the membership, so no peer routes a request here
    /// before the data exists.
    ///
    /// Returns the number of key records migrated in.
    pub async fn join(&self, contact_list: &str) -> DhtResult<usize> {
        let _guard = self.op_lock.lock().await;
        let myself = self.identity.require()?;
        if self.phase() != Phase::Unconfigured {
            return Err(DhtError::InvalidState(
                "node is already part of a network".to_string(),
            ));
        }

        let contacts: Vec<NodeId> = parse_peer_list(contact_list)?
            .into_iter()
            .filter(|id| id != &myself.id)
            .collect();
        if contacts.is_empty() {
            return Err(DhtError::MalformedInput(
                "join needs at least one other node".to_string(),
            ));
        }

        // First reachable contact wins; its view of the membership is what we
        // adopt.
        let mut fetched: DhtResult<String> = Err(DhtError::PeerUnreachable {
            peer: contacts[0].clone(),
            reason: "no contact reachable".to_string(),
        });
        for contact in &contacts {
            match self.client.fetch_peers(contact).await {
                Ok(body) => {
                    fetched = Ok(body);
                    break;
                }
                Err(e) => {
                    warn!(contact = %contact, "contact unreachable: {e}");
                    fetched = Err(e);
                }
            }
        }
        let wire = fetched?;

        let checkpoint = self.peers.checkpoint();
        for id in parse_peer_list(&wire)? {
            let peer = Peer {
                position: self.ring.position_of(id.as_str()),
                id,
            };
            if let Err(e) = self.peers.add_peer(peer) {
                self.peers.restore(checkpoint);
                return Err(e);
            }
        }

        // The peer right after us in ring order owned our new range until
        // this moment. A missing successor means the contact only knew about
        // us, so there is nothing to migrate.
        let mut moved = 0;
        if let Some(old_owner) = self.peers.successor_of(&myself) {
            let predecessor = self
                .peers
                .predecessor_of(&myself)
                .unwrap_or_else(|| myself.clone());
            let request = HandoffRequest {
                target: myself.id.clone(),
                lower: predecessor.position,
                upper: myself.position,
            };
            match self.client.handoff(&old_owner.id, &request).await {
                Ok(count) => moved = count,
                Err(e) => {
                    warn!(owner = %old_owner.id, "join aborted, range handoff failed: {e}");
                    self.peers.restore(checkpoint);
                    return Err(e);
                }
            }
        }

        // Keys are in hand; now the rest of the ring may learn about us.
        let announcement = myself.id.as_str().to_string();
        for peer in self.peers.all_peers() {
            if peer.id == myself.id {
                continue;
            }
            if let Err(e) = self.client.add_peers(&peer.id, announcement.clone()).await {
                warn!(peer = %peer.id, "join announcement not delivered: {e}");
            }
        }

        self.set_phase(Phase::Member);
        info!(moved, peers = self.peers.len(), "joined the network");
        Ok(moved)
    }

    /// Merges a peer list into the table. Propagation only; never triggers
    /// migration. A position collision rejects the whole batch and restores
    /// the previous table.
    pub async fn add_peers(&self, peer_list: &str) -> DhtResult<usize> {
        let _guard = self.op_lock.lock().await;
        let ids = parse_peer_list(peer_list)?;
        let checkpoint = self.peers.checkpoint();

        let mut added = 0;
        for id in ids {
            let peer = Peer {
                position: self.ring.position_of(id.as_str()),
                id,
            };
            match self.peers.add_peer(peer) {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(e) => {
                    self.peers.restore(checkpoint);
                    return Err(e);
                }
            }
        }

        // A node pulled into a ring by someone else's bootstrap or join
        // becomes a member the moment it knows of another peer.
        if self.phase() == Phase::Unconfigured
            && self.identity.get().is_some()
            && self.peers.len() > 1
        {
            self.set_phase(Phase::Member);
        }

        if added > 0 {
            info!(added, peers = self.peers.len(), "peer table updated");
        }
        Ok(added)
    }

    /// Leaves the ring: pushes every local key record to the successor, and
    /// only after the successor acknowledged broadcasts this node's removal.
    /// A failed push aborts the leave with table, store, and phase unchanged.
    ///
    /// Returns the number of key records handed over.
    pub async fn leave(&self) -> DhtResult<usize> {
        let _guard = self.op_lock.lock().await;
        let myself = self.identity.require()?;
        if self.phase() == Phase::Left {
            return Err(DhtError::InvalidState("node already left".to_string()));
        }

        let successor = match self.peers.successor_of(&myself) {
            Some(successor) => successor,
            None => {
                // Sole member: nothing inherits the range, nothing migrates.
                self.set_phase(Phase::Left);
                info!("left as the only member, no keys handed over");
                return Ok(0);
            }
        };

        // From here on `ensure_serving` refuses key traffic. Writes that
        // passed the guard before the phase flip became visible land in the
        // store and are picked up by a later drain round; nothing is deleted
        // until every current record has been acknowledged.
        let resuming = self.phase();
        self.set_phase(Phase::Leaving);

        let mut sent: HashMap<String, Vec<u8>> = HashMap::new();
        loop {
            let entries: Vec<MigrateEntry> = self
                .store
                .entries()
                .into_iter()
                .filter(|(key, value)| sent.get(key) != Some(value))
                .map(|(key, value)| MigrateEntry { key, value })
                .collect();
            if entries.is_empty() {
                break;
            }
            let request = MigrateRequest {
                from: myself.id.clone(),
                entries,
            };
            if let Err(e) = self.client.migrate(&successor.id, &request).await {
                self.set_phase(resuming);
                return Err(e);
            }
            for entry in request.entries {
                sent.insert(entry.key, entry.value);
            }
        }

        let count = sent.len();
        for key in sent.keys() {
            self.store.delete(key);
        }
        self.peers.remove_peer(&myself.id);

        for peer in self.peers.all_peers() {
            if let Err(e) = self.client.remove_peer(&peer.id, &myself.id).await {
                warn!(peer = %peer.id, "departure not delivered: {e}");
            }
        }

        self.set_phase(Phase::Left);
        info!(moved = count, successor = %successor.id, "left the network");
        Ok(count)
    }

    /// Unconditionally drops a peer from the local table. No migration: the
    /// peer is known to be gone and its keys are accepted as lost.
    pub async fn remove_peer(&self, token: &str) -> DhtResult<bool> {
        let _guard = self.op_lock.lock().await;
        let id = NodeId::parse(token)?;
        let removed = self.peers.remove_peer(&id);
        if removed {
            info!(peer = %id, remaining = self.peers.len(), "peer removed from table");
        }
        Ok(removed)
    }

    /// Applies an inbound migration batch straight to the local store.
    pub fn apply_migration(&self, request: MigrateRequest) -> DhtResult<usize> {
        self.ensure_serving()?;
        let count = request.entries.len();
        for entry in request.entries {
            self.store.set(entry.key, entry.value);
        }
        info!(from = %request.from, applied = count, "migration batch applied");
        Ok(count)
    }

    /// Hands the requested range over to a joiner: pushes every local key
    /// whose position lies in `(lower, upper]`, deletes the pushed records
    /// once acknowledged, and reports how many moved.
    pub async fn handoff(&self, request: HandoffRequest) -> DhtResult<usize> {
        let _guard = self.op_lock.lock().await;
        self.ensure_serving()?;
        let myself = self.identity.require()?;

        let outgoing: Vec<MigrateEntry> = self
            .store
            .entries()
            .into_iter()
            .filter(|(key, _)| {
                in_ownership_range(self.ring.position_of(key), request.lower, request.upper)
            })
            .map(|(key, value)| MigrateEntry { key, value })
            .collect();
        if outgoing.is_empty() {
            return Ok(0);
        }

        let count = outgoing.len();
        let batch = MigrateRequest {
            from: myself.id,
            entries: outgoing,
        };
        self.client.migrate(&request.target, &batch).await?;
        for entry in &batch.entries {
            self.store.delete(&entry.key);
        }
        info!(moved = count, target = %request.target, "range handed off to joiner");
        Ok(count)
    }

    /// The current peer list in wire format, as served by `GET /dht/peers`
    /// and consumed by joining nodes.
    pub fn peers_wire(&self) -> String {
        let peers = self.peers.all_peers();
        encode_peer_list(peers.iter().map(|peer| &peer.id))
    }
}
