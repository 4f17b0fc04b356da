//! Consistent Hashing Ring
//!
//! Places node addresses and keys on the same fixed-size numeric ring and
//! resolves ring positions to owning peers.
//!
//! ## Core Mechanisms
//! - **Hash Ring**: a pure, deterministic mapping from an identifier string to
//!   a position in `[0, ring_size)`. Every node must use the same algorithm and
//!   modulus or ownership breaks network-wide.
//! - **Peer Table**: this node's view of the membership (address + position),
//!   always including the node itself once its identity is known.
//! - **Ownership**: peer P with predecessor P' owns the half-open interval
//!   `(p', p]`, wrapping at the ring boundary. The intervals partition the
//!   whole ring with no gaps and no overlaps.

pub mod hash;
pub mod table;

#[cfg(test)]
mod tests;
