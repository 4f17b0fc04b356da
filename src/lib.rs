//! Distributed Hash Table Node Library
//!
//! This library crate defines the core modules that make up a DHT node.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The node is composed of five loosely coupled subsystems:
//!
//! - **`ring`**: Consistent hashing. Maps node addresses and keys onto a fixed
//!   numeric ring and resolves which peer owns any given ring position.
//! - **`storage`**: The local in-memory key-value store. Each key lives in
//!   exactly one node's store at a time.
//! - **`routing`**: The request router. Serves key operations locally when this
//!   node owns the key, otherwise forwards them one hop to the owning peer.
//! - **`membership`**: The membership controller. Orchestrates the
//!   initialize / join / leave protocols and the key migration they trigger.
//! - **`server`**: The HTTP transport glue. Maps the public URL surface onto
//!   core operations; nodes talk to each other over the same surface.

pub mod error;
pub mod membership;
pub mod ring;
pub mod routing;
pub mod server;
pub mod storage;
