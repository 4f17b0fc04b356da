//! Request Routing
//!
//! Decides, per key operation, whether this node serves it from its local
//! store or forwards it one hop to the owning peer. Ownership is recomputed
//! from the live peer table on every operation; nothing is cached across
//! membership changes.

pub mod client;
pub mod router;

#[cfg(test)]
mod tests;
