//! Membership Module
//!
//! Orchestrates every change to the network's topology: bootstrapping a fresh
//! ring, joining a running one, leaving gracefully, and propagating peer-table
//! updates. This is the only module that mutates the peer table or moves key
//! records between stores.
//!
//! ## Core Mechanisms
//! - **Phase machine**: `Unconfigured -> Standalone/Member -> Left`. A node's
//!   ring position is fixed the moment it learns its own address.
//! - **Migration before announcement**: a joiner only broadcasts itself after
//!   it holds the keys of its new range; a leaver only broadcasts its removal
//!   after its successor acknowledged the handover. Ring consistency rests on
//!   this ordering, not on any distributed transaction.
//! - **Atomic aborts**: if a migration round trip fails, the peer table is
//!   restored to its pre-operation checkpoint and no keys are deleted.

pub mod controller;
pub mod protocol;
