//! HTTP Transport Layer
//!
//! Thin glue between the public URL surface and the core components. Decodes
//! requests, dispatches to the router or the membership controller, and maps
//! typed errors to HTTP statuses. Inter-node traffic rides the same surface,
//! so these handlers serve clients and peers alike.

pub mod handlers;

#[cfg(test)]
mod tests;

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::bail;
use axum::{
    Extension, Router,
    middleware,
    routing::{delete, get, post, put},
};
use tokio::net::TcpListener;
use tracing::info;

use crate::membership::controller::{MembershipController, NodeIdentity};
use crate::membership::protocol::{
    ENDPOINT_HANDOFF, ENDPOINT_LOCAL_KEYS, ENDPOINT_MIGRATE, ENDPOINT_PEERS,
};
use crate::ring::hash::HashRing;
use crate::ring::table::{NodeId, PeerTable};
use crate::routing::client::PeerClient;
use crate::routing::router::KeyRouter;
use crate::storage::memory::LocalStore;

/// How many consecutive ports to try before giving up. Unbounded retry would
/// spin forever on a systemic bind failure.
pub const MAX_PORT_RETRIES: u16 = 16;

/// Wires up one node's components and its HTTP application.
///
/// With `advertise` the node's identity and ring position are fixed up front;
/// without it the node stays unconfigured until the first inbound request
/// reveals the address it is reachable under.
pub fn build_node(
    ring: HashRing,
    advertise: Option<NodeId>,
) -> (Router, Arc<MembershipController>, Arc<KeyRouter>) {
    let peers = Arc::new(PeerTable::new());
    let store = Arc::new(LocalStore::new());
    let client = Arc::new(PeerClient::new());
    let identity = Arc::new(NodeIdentity::new(ring));

    let controller = Arc::new(MembershipController::new(
        ring,
        peers.clone(),
        store.clone(),
        client.clone(),
        identity.clone(),
    ));
    let router = Arc::new(KeyRouter::new(ring, peers, store, client, identity));

    if let Some(id) = advertise {
        controller.configure(id);
    }

    let app = Router::new()
        .route("/", get(handlers::help))
        .route(ENDPOINT_LOCAL_KEYS, get(handlers::local_keys))
        .route("/db/{*key}", get(handlers::get_key))
        .route("/db/{*key}", put(handlers::set_key))
        .route("/db/{*key}", delete(handlers::delete_key))
        .route("/dht/keyspace", get(handlers::keyspace))
        .route(ENDPOINT_PEERS, get(handlers::peers))
        .route(ENDPOINT_PEERS, post(handlers::add_peers))
        .route("/dht/initialize", post(handlers::initialize))
        .route("/dht/join", post(handlers::join))
        .route("/dht/leave", get(handlers::leave))
        .route("/dht/remove_peer/{id}", delete(handlers::remove_peer))
        .route(ENDPOINT_MIGRATE, post(handlers::migrate))
        .route(ENDPOINT_HANDOFF, post(handlers::handoff))
        .fallback(handlers::bad_request)
        .layer(middleware::from_fn(handlers::setup_layer))
        .layer(Extension(controller.clone()))
        .layer(Extension(router.clone()));

    (app, controller, router)
}

/// Binds the first free port among the `MAX_PORT_RETRIES` consecutive ports
/// starting at `base_port`, stopping early at the end of the port space.
pub async fn bind_with_retry(host: IpAddr, base_port: u16) -> anyhow::Result<TcpListener> {
    let mut port = base_port;
    for _ in 0..MAX_PORT_RETRIES {
        let addr = SocketAddr::new(host, port);
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                info!("listening on {addr}");
                return Ok(listener);
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                info!("port {port} taken, trying the next one");
            }
            Err(e) => return Err(e.into()),
        }
        port = match port.checked_add(1) {
            Some(next) => next,
            None => break,
        };
    }
    bail!("no free port at or after {base_port}");
}
