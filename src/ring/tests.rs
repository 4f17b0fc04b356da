//! Ring Module Tests
//!
//! Validates the hash placement and ownership resolution logic.
//!
//! ## Test Scopes
//! - **HashRing**: deterministic, well-distributed placement within bounds.
//! - **PeerTable**: owner/predecessor/successor walks with wraparound, the
//!   no-gap no-overlap partition property, and idempotent mutation.

#[cfg(test)]
mod tests {
    use crate::error::DhtError;
    use crate::ring::hash::{HashRing, in_keyspace_range, in_ownership_range};
    use crate::ring::table::{NodeId, Peer, PeerTable};

    fn peer(addr: &str, position: u64) -> Peer {
        Peer {
            id: NodeId::parse(addr).unwrap(),
            position,
        }
    }

    /// Three peers on a ring of size 1000, the worked example from the
    /// design discussion: ranges are (900, 100], (100, 500], (500, 900].
    fn three_peer_table() -> PeerTable {
        let table = PeerTable::new();
        table.add_peer(peer("a:8000", 100)).unwrap();
        table.add_peer(peer("b:8001", 500)).unwrap();
        table.add_peer(peer("c:8002", 900)).unwrap();
        table
    }

    // ============================================================
    // HASH RING
    // ============================================================

    #[test]
    fn test_position_is_deterministic() {
        let ring = HashRing::default();
        assert_eq!(ring.position_of("foo"), ring.position_of("foo"));
    }

    #[test]
    fn test_position_is_within_ring_size() {
        let ring = HashRing::new(1000);
        for i in 0..1000 {
            assert!(ring.position_of(&format!("key-{i}")) < 1000);
        }
    }

    #[test]
    fn test_position_distribution() {
        let ring = HashRing::new(256);
        let mut buckets = std::collections::HashSet::new();
        for i in 0..10_000 {
            buckets.insert(ring.position_of(&format!("key-{i}")));
        }
        // 10k keys over 256 positions should touch most of them.
        assert!(buckets.len() > 200, "only {} buckets used", buckets.len());
    }

    // ============================================================
    // OWNERSHIP RESOLUTION
    // ============================================================

    #[test]
    fn test_owner_of_walks_to_next_position() {
        let table = three_peer_table();

        assert_eq!(table.owner_of(620).unwrap().position, 900);
        assert_eq!(table.owner_of(101).unwrap().position, 500);
        // A peer owns its own position (interval is right-inclusive).
        assert_eq!(table.owner_of(500).unwrap().position, 500);
    }

    #[test]
    fn test_owner_of_wraps_past_maximum() {
        let table = three_peer_table();

        assert_eq!(table.owner_of(950).unwrap().position, 100);
        assert_eq!(table.owner_of(0).unwrap().position, 100);
    }

    #[test]
    fn test_owner_of_empty_table() {
        let table = PeerTable::new();
        assert!(table.owner_of(42).is_none());
    }

    #[test]
    fn test_predecessor_wraps_to_maximum() {
        let table = three_peer_table();

        let first = table.owner_of(100).unwrap();
        assert_eq!(table.predecessor_of(&first).unwrap().position, 900);
        let mid = table.owner_of(500).unwrap();
        assert_eq!(table.predecessor_of(&mid).unwrap().position, 100);
    }

    #[test]
    fn test_sole_peer_is_its_own_predecessor() {
        let table = PeerTable::new();
        let only = peer("a:8000", 100);
        table.add_peer(only.clone()).unwrap();

        assert_eq!(table.predecessor_of(&only).unwrap(), only);
        assert!(table.successor_of(&only).is_none());
    }

    #[test]
    fn test_successor_excludes_self_and_wraps() {
        let table = three_peer_table();

        let last = table.owner_of(900).unwrap();
        assert_eq!(table.successor_of(&last).unwrap().position, 100);
        let first = table.owner_of(100).unwrap();
        assert_eq!(table.successor_of(&first).unwrap().position, 500);
    }

    #[test]
    fn test_ranges_partition_the_ring() {
        let table = three_peer_table();
        let peers = table.all_peers();

        // Every position has exactly one owner, and that owner's (pred, self]
        // interval contains it.
        for position in 0..1000u64 {
            let owner = table.owner_of(position).unwrap();
            let pred = table.predecessor_of(&owner).unwrap();
            assert!(
                in_ownership_range(position, pred.position, owner.position),
                "position {position} resolved to owner {} outside its range",
                owner.position
            );
            let claiming: Vec<_> = peers
                .iter()
                .filter(|p| {
                    let pred = table.predecessor_of(p).unwrap();
                    in_ownership_range(position, pred.position, p.position)
                })
                .collect();
            assert_eq!(claiming.len(), 1, "position {position} claimed by {claiming:?}");
        }
    }

    // ============================================================
    // TABLE MUTATION
    // ============================================================

    #[test]
    fn test_add_peer_is_idempotent() {
        let table = three_peer_table();

        let changed = table.add_peer(peer("a:8000", 100)).unwrap();
        assert!(!changed);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_position_collision_is_rejected() {
        let table = three_peer_table();

        let result = table.add_peer(peer("d:8003", 500));
        assert!(matches!(result, Err(DhtError::RingInconsistency(_))));
        // Existing entry untouched.
        assert_eq!(table.owner_of(500).unwrap().id.as_str(), "b:8001");
    }

    #[test]
    fn test_remove_peer_is_idempotent() {
        let table = three_peer_table();
        let id = NodeId::parse("b:8001").unwrap();

        assert!(table.remove_peer(&id));
        assert!(!table.remove_peer(&id));
        assert_eq!(table.len(), 2);
        // The removed peer's range falls to its successor.
        assert_eq!(table.owner_of(300).unwrap().position, 900);
    }

    #[test]
    fn test_checkpoint_restore_roundtrip() {
        let table = three_peer_table();
        let checkpoint = table.checkpoint();

        table.remove_peer(&NodeId::parse("a:8000").unwrap());
        table.add_peer(peer("d:8003", 700)).unwrap();
        table.restore(checkpoint);

        assert_eq!(table.len(), 3);
        assert!(table.contains(&NodeId::parse("a:8000").unwrap()));
        assert!(!table.contains(&NodeId::parse("d:8003").unwrap()));
    }

    // ============================================================
    // RANGE HELPERS
    // ============================================================

    #[test]
    fn test_ownership_range_wraparound() {
        // Range (900, 100] on a ring of 1000.
        assert!(in_ownership_range(950, 900, 100));
        assert!(in_ownership_range(0, 900, 100));
        assert!(in_ownership_range(100, 900, 100));
        assert!(!in_ownership_range(900, 900, 100));
        assert!(!in_ownership_range(500, 900, 100));
        // Degenerate single-peer range covers everything.
        assert!(in_ownership_range(123, 700, 700));
    }

    #[test]
    fn test_keyspace_range_is_inclusive_both_ends() {
        assert!(in_keyspace_range(100, 100, 500));
        assert!(in_keyspace_range(500, 100, 500));
        assert!(!in_keyspace_range(501, 100, 500));
    }

    #[test]
    fn test_keyspace_range_wraparound() {
        assert!(in_keyspace_range(950, 900, 100));
        assert!(in_keyspace_range(900, 900, 100));
        assert!(in_keyspace_range(100, 900, 100));
        assert!(!in_keyspace_range(400, 900, 100));
    }

    // ============================================================
    // NODE IDS
    // ============================================================

    #[test]
    fn test_node_id_parse_accepts_host_port() {
        assert!(NodeId::parse("127.0.0.1:8000").is_ok());
        assert!(NodeId::parse("some-host:65535").is_ok());
    }

    #[test]
    fn test_node_id_parse_rejects_garbage() {
        for bad in ["", "nohost", ":8000", "host:", "host:notaport", "host:99999"] {
            assert!(
                matches!(NodeId::parse(bad), Err(DhtError::MalformedInput(_))),
                "expected rejection of '{bad}'"
            );
        }
    }
}
