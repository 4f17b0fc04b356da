use std::time::Duration;

use crate::error::{DhtError, DhtResult};
use crate::membership::protocol::{
    ENDPOINT_HANDOFF, ENDPOINT_LOCAL_KEYS, ENDPOINT_MIGRATE, ENDPOINT_PEERS, HandoffRequest,
    HandoffResponse, MigrateRequest, MigrateResponse,
};
use crate::ring::table::NodeId;

/// Marker header set on node-to-node forwards. A node receiving a marked
/// request it does not own reports a ring inconsistency instead of bouncing
/// the request onward.
pub const FORWARDED_HEADER: &str = "x-dht-forwarded";

const PEER_TIMEOUT: Duration = Duration::from_secs(2);

/// HTTP client side of the peer channel. Nodes talk to each other over the
/// same public surface clients use, so this is a thin wrapper around the
/// `/db` and `/dht` endpoints with a bounded timeout on every round trip.
pub struct PeerClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl PeerClient {
    pub fn new() -> Self {
        Self::with_timeout(PEER_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    fn unreachable(peer: &NodeId, err: impl std::fmt::Display) -> DhtError {
        DhtError::PeerUnreachable {
            peer: peer.clone(),
            reason: err.to_string(),
        }
    }

    /// Builds the `/db/{key}` URL for a forwarded key operation. The inbound
    /// path arrives percent-decoded, so every segment is re-encoded here; a
    /// raw `?` or `#` in the key would otherwise cut the path short and the
    /// owner would store or look up a truncated key.
    fn key_url(peer: &NodeId, key: &str) -> DhtResult<reqwest::Url> {
        let mut url =
            reqwest::Url::parse(&peer.base_url()).map_err(|e| Self::unreachable(peer, e))?;
        url.path_segments_mut()
            .map_err(|_| Self::unreachable(peer, "address is not a base url"))?
            .pop_if_empty()
            .push("db")
            .extend(key.split('/'));
        Ok(url)
    }

    fn check_ok(peer: &NodeId, response: &reqwest::Response) -> DhtResult<()> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::unreachable(
                peer,
                format!("status {}", response.status()),
            ))
        }
    }

    // --- Forwarded key operations ---

    pub async fn get_key(&self, peer: &NodeId, key: &str) -> DhtResult<Vec<u8>> {
        let response = self
            .http
            .get(Self::key_url(peer, key)?)
            .header(FORWARDED_HEADER, "1")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Self::unreachable(peer, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DhtError::NotFound);
        }
        Self::check_ok(peer, &response)?;
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::unreachable(peer, e))?;
        Ok(body.to_vec())
    }

    pub async fn put_key(&self, peer: &NodeId, key: &str, value: Vec<u8>) -> DhtResult<()> {
        let response = self
            .http
            .put(Self::key_url(peer, key)?)
            .header(FORWARDED_HEADER, "1")
            .timeout(self.timeout)
            .body(value)
            .send()
            .await
            .map_err(|e| Self::unreachable(peer, e))?;
        Self::check_ok(peer, &response)
    }

    pub async fn delete_key(&self, peer: &NodeId, key: &str) -> DhtResult<()> {
        let response = self
            .http
            .delete(Self::key_url(peer, key)?)
            .header(FORWARDED_HEADER, "1")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Self::unreachable(peer, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DhtError::NotFound);
        }
        Self::check_ok(peer, &response)
    }

    /// A peer's local key listing, used by the keyspace fan-out.
    pub async fn local_keys(&self, peer: &NodeId) -> DhtResult<Vec<String>> {
        let response = self
            .http
            .get(format!("{}{}", peer.base_url(), ENDPOINT_LOCAL_KEYS))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Self::unreachable(peer, e))?;
        Self::check_ok(peer, &response)?;
        response.json().await.map_err(|e| Self::unreachable(peer, e))
    }

    // --- Membership traffic ---

    /// A peer's current peer list, in wire format.
    pub async fn fetch_peers(&self, peer: &NodeId) -> DhtResult<String> {
        let response = self
            .http
            .get(format!("{}{}", peer.base_url(), ENDPOINT_PEERS))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Self::unreachable(peer, e))?;
        Self::check_ok(peer, &response)?;
        response.text().await.map_err(|e| Self::unreachable(peer, e))
    }

    pub async fn add_peers(&self, peer: &NodeId, wire_list: String) -> DhtResult<()> {
        let response = self
            .http
            .post(format!("{}{}", peer.base_url(), ENDPOINT_PEERS))
            .timeout(self.timeout)
            .body(wire_list)
            .send()
            .await
            .map_err(|e| Self::unreachable(peer, e))?;
        Self::check_ok(peer, &response)
    }

    pub async fn remove_peer(&self, peer: &NodeId, removed: &NodeId) -> DhtResult<()> {
        let response = self
            .http
            .delete(format!("{}/dht/remove_peer/{}", peer.base_url(), removed))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Self::unreachable(peer, e))?;
        Self::check_ok(peer, &response)
    }

    /// Pushes a batch of key records to the node that now owns them. The
    /// caller may delete its copies only after this returns `Ok`.
    pub async fn migrate(&self, peer: &NodeId, request: &MigrateRequest) -> DhtResult<usize> {
        let response = self
            .http
            .post(format!("{}{}", peer.base_url(), ENDPOINT_MIGRATE))
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| Self::unreachable(peer, e))?;
        Self::check_ok(peer, &response)?;
        let ack: MigrateResponse = response
            .json()
            .await
            .map_err(|e| Self::unreachable(peer, e))?;
        Ok(ack.applied)
    }

    /// Asks `peer` to push the requested range to the joiner and delete its
    /// own copies. Blocks until the receiving side holds the data.
    pub async fn handoff(&self, peer: &NodeId, request: &HandoffRequest) -> DhtResult<usize> {
        let response = self
            .http
            .post(format!("{}{}", peer.base_url(), ENDPOINT_HANDOFF))
            // The handoff nests a migrate round trip, so give it more room.
            .timeout(self.timeout * 2)
            .json(request)
            .send()
            .await
            .map_err(|e| Self::unreachable(peer, e))?;
        Self::check_ok(peer, &response)?;
        let ack: HandoffResponse = response
            .json()
            .await
            .map_err(|e| Self::unreachable(peer, e))?;
        Ok(ack.moved)
    }
}

impl Default for PeerClient {
    fn default() -> Self {
        Self::new()
    }
}
