//! Local Key-Value Storage
//!
//! The in-memory store holding the key records this node currently owns.
//! Records only ever move between stores through membership-driven migration;
//! they are never duplicated permanently.

pub mod memory;
