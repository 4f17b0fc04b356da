use sha2::{Digest, Sha256};

/// A position on the hash ring, in `[0, ring_size)`.
pub type RingPosition = u64;

/// Default ring size: a 32-bit position space.
pub const DEFAULT_RING_SIZE: u64 = 1 << 32;

/// Deterministic mapping from an identifier (node address or key) onto the
/// ring. Stateless; cheap to copy into every component that hashes.
///
/// SHA-256 truncated to 64 bits, reduced modulo the ring size. Stable across
/// restarts and platforms, which is what keeps ownership consistent between
/// independently running nodes.
#[derive(Debug, Clone, Copy)]
pub struct HashRing {
    size: u64,
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_RING_SIZE)
    }
}

impl HashRing {
    pub fn new(size: u64) -> Self {
        debug_assert!(size > 0);
        Self { size }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn position_of(&self, identifier: &str) -> RingPosition {
        let digest = Sha256::digest(identifier.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(prefix) % self.size
    }
}

/// Whether `position` falls in the ownership interval `(lower, upper]`,
/// wrapping at the ring boundary. When `lower == upper` the interval is the
/// entire ring (a sole peer owns everything).
pub fn in_ownership_range(position: RingPosition, lower: RingPosition, upper: RingPosition) -> bool {
    if lower < upper {
        position > lower && position <= upper
    } else {
        position > lower || position <= upper
    }
}

/// Whether `position` falls in the inclusive interval `[lower, upper]`.
/// `lower > upper` wraps: `[lower, ring_size) ∪ [0, upper]`.
pub fn in_keyspace_range(position: RingPosition, lower: RingPosition, upper: RingPosition) -> bool {
    if lower <= upper {
        position >= lower && position <= upper
    } else {
        position >= lower || position <= upper
    }
}
