//! Routing Module Tests
//!
//! Exercises the serve-local path, routing failures, and the keyspace
//! fan-out filter without standing up a network. Forwarding across real
//! nodes is covered by the cluster tests in the membership module.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::error::DhtError;
    use crate::membership::controller::NodeIdentity;
    use crate::ring::hash::HashRing;
    use crate::ring::table::{NodeId, Peer, PeerTable};
    use crate::routing::client::PeerClient;
    use crate::routing::router::KeyRouter;
    use crate::storage::memory::LocalStore;

    fn single_node_router(addr: &str) -> KeyRouter {
        let ring = HashRing::default();
        let peers = Arc::new(PeerTable::new());
        let store = Arc::new(LocalStore::new());
        let client = Arc::new(PeerClient::with_timeout(Duration::from_millis(200)));
        let identity = Arc::new(NodeIdentity::new(ring));

        let myself = identity.configure(NodeId::parse(addr).unwrap());
        peers.add_peer(myself).unwrap();

        KeyRouter::new(ring, peers, store, client, identity)
    }

    /// A key the given peer owns under the router's table, found by trial.
    fn key_owned_by(ring: &HashRing, table: &PeerTable, owner: &NodeId) -> String {
        for i in 0..10_000 {
            let key = format!("sample-{i}");
            if &table.owner_of(ring.position_of(&key)).unwrap().id == owner {
                return key;
            }
        }
        panic!("no key found for owner {owner}");
    }

    #[tokio::test]
    async fn test_sole_owner_serves_locally() {
        let router = single_node_router("127.0.0.1:8000");

        router.set("foo", b"bar".to_vec(), false).await.unwrap();
        assert_eq!(router.get("foo", false).await.unwrap(), b"bar".to_vec());
        router.delete("foo", false).await.unwrap();
        assert!(matches!(
            router.get("foo", false).await,
            Err(DhtError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_absent_key_is_not_found() {
        let router = single_node_router("127.0.0.1:8000");
        assert!(matches!(
            router.delete("ghost", false).await,
            Err(DhtError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_node_refuses_key_traffic() {
        let ring = HashRing::default();
        let router = KeyRouter::new(
            ring,
            Arc::new(PeerTable::new()),
            Arc::new(LocalStore::new()),
            Arc::new(PeerClient::new()),
            Arc::new(NodeIdentity::new(ring)),
        );

        assert!(matches!(
            router.get("foo", false).await,
            Err(DhtError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_forwarded_request_off_owner_is_ring_inconsistency() {
        let ring = HashRing::default();
        let peers = Arc::new(PeerTable::new());
        let store = Arc::new(LocalStore::new());
        let client = Arc::new(PeerClient::with_timeout(Duration::from_millis(200)));
        let identity = Arc::new(NodeIdentity::new(ring));

        let myself = identity.configure(NodeId::parse("127.0.0.1:8000").unwrap());
        peers.add_peer(myself).unwrap();
        let remote = NodeId::parse("127.0.0.1:9").unwrap();
        peers
            .add_peer(Peer {
                position: ring.position_of(remote.as_str()),
                id: remote.clone(),
            })
            .unwrap();

        let key = key_owned_by(&ring, &peers, &remote);
        let router = KeyRouter::new(ring, peers, store, client, identity);

        // One hop already taken; a second would bounce between nodes.
        assert!(matches!(
            router.get(&key, true).await,
            Err(DhtError::RingInconsistency(_))
        ));
        // A fresh request is allowed its hop, but the owner is not there.
        assert!(matches!(
            router.get(&key, false).await,
            Err(DhtError::PeerUnreachable { .. })
        ));
    }

    #[tokio::test]
    async fn test_keyspace_rejects_bounds_outside_the_ring() {
        let ring = HashRing::default();
        let router = single_node_router("127.0.0.1:8000");

        assert!(matches!(
            router.keyspace_range(ring.size(), 0).await,
            Err(DhtError::MalformedInput(_))
        ));
        assert!(matches!(
            router.keyspace_range(0, ring.size()).await,
            Err(DhtError::MalformedInput(_))
        ));
    }

    #[tokio::test]
    async fn test_keyspace_range_filters_by_position() {
        let ring = HashRing::default();
        let router = single_node_router("127.0.0.1:8000");

        for i in 0..50 {
            let key = format!("key-{i}");
            router.set(&key, vec![i as u8], false).await.unwrap();
        }

        // Full ring returns everything.
        let all = router.keyspace_range(0, ring.size() - 1).await.unwrap();
        assert_eq!(all.len(), 50);

        // A point interval returns exactly the keys at that position.
        let position = ring.position_of("key-7");
        let only = router.keyspace_range(position, position).await.unwrap();
        assert!(only.contains(&"key-7".to_string()));
        for key in &only {
            assert_eq!(ring.position_of(key), position);
        }

        // A wrapping interval excluding key-7's position drops it.
        let wrapped = router
            .keyspace_range(
                (position + 1) % ring.size(),
                (position + ring.size() - 1) % ring.size(),
            )
            .await
            .unwrap();
        assert_eq!(wrapped.len() + only.len(), 50);
        assert!(!wrapped.contains(&"key-7".to_string()));
    }
}
