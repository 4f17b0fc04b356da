use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Path, Query, Request},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::error::{DhtError, DhtResult};
use crate::membership::controller::MembershipController;
use crate::membership::protocol::{
    HandoffRequest, HandoffResponse, MigrateRequest, MigrateResponse,
};
use crate::ring::hash::RingPosition;
use crate::routing::client::FORWARDED_HEADER;
use crate::routing::router::KeyRouter;

const BAD_REQUEST_BODY: &str = "Sorry, your request was not properly formed.\n";

impl IntoResponse for DhtError {
    fn into_response(self) -> Response {
        let status = match &self {
            DhtError::NotFound => StatusCode::NOT_FOUND,
            DhtError::PeerUnreachable { .. } => StatusCode::BAD_GATEWAY,
            DhtError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            DhtError::RingInconsistency(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DhtError::InvalidState(_) => StatusCode::CONFLICT,
        };
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }
        (status, format!("{self}\n")).into_response()
    }
}

/// Completes the node's setup from the first inbound request: the `Host`
/// header is the address the caller reached us under, which is exactly the
/// identity the rest of the network will use for us.
pub async fn setup_layer(
    Extension(controller): Extension<Arc<MembershipController>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(host) = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
    {
        controller.finish_setup_from_host(host);
    }
    next.run(request).await
}

pub async fn bad_request() -> Response {
    (StatusCode::BAD_REQUEST, BAD_REQUEST_BODY).into_response()
}

pub async fn help(Extension(controller): Extension<Arc<MembershipController>>) -> String {
    let uri = controller
        .identity()
        .get()
        .map(|peer| peer.id.base_url())
        .unwrap_or_else(|| "http://<host>:<port>".to_string());
    format!(
        "Hi there! Welcome to my DHT server. Here's how the public API works:\n\
         \n\
         initialize_dht => POST '{uri}/dht/initialize', body => host1:port1&&host2:port2&&host3:port3\n\
         \n\
         get_local_keys => GET '{uri}/db'\n\
         get_val => GET '{uri}/db/<key>'\n\
         get_all_keys => GET '{uri}/dht/keyspace'\n\
         \n\
         set => PUT '{uri}/db/<key>', body => <val>\n\
         delete_key => DELETE '{uri}/db/<key>'\n\
         \n\
         peer_list => GET '{uri}/dht/peers'\n\
         \n\
         join_dht => POST '{uri}/dht/join', body => host1:port1&&host2:port2&&host3:port3\n\
         leave_dht => GET '{uri}/dht/leave'\n"
    )
}

fn is_forwarded(headers: &HeaderMap) -> bool {
    headers.contains_key(FORWARDED_HEADER)
}

// --- Key operations ---

pub async fn local_keys(Extension(router): Extension<Arc<KeyRouter>>) -> Json<Vec<String>> {
    let mut keys = router.store().keys();
    keys.sort();
    Json(keys)
}

pub async fn get_key(
    Extension(router): Extension<Arc<KeyRouter>>,
    Extension(controller): Extension<Arc<MembershipController>>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> DhtResult<Vec<u8>> {
    controller.ensure_serving()?;
    router.get(&key, is_forwarded(&headers)).await
}

pub async fn set_key(
    Extension(router): Extension<Arc<KeyRouter>>,
    Extension(controller): Extension<Arc<MembershipController>>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> DhtResult<StatusCode> {
    controller.ensure_serving()?;
    router.set(&key, body.to_vec(), is_forwarded(&headers)).await?;
    Ok(StatusCode::OK)
}

pub async fn delete_key(
    Extension(router): Extension<Arc<KeyRouter>>,
    Extension(controller): Extension<Arc<MembershipController>>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> DhtResult<StatusCode> {
    controller.ensure_serving()?;
    router.delete(&key, is_forwarded(&headers)).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct KeyspaceParams {
    lower_bound: Option<String>,
    upper_bound: Option<String>,
}

fn parse_bound(name: &str, raw: &str) -> DhtResult<RingPosition> {
    raw.parse()
        .map_err(|_| DhtError::MalformedInput(format!("{name} '{raw}' is not a ring position")))
}

/// `/dht/keyspace`: without parameters, every key in the network; with both
/// bounds, only keys whose position lies in `[lower, upper]` (inclusive,
/// wrapping when `lower > upper`).
pub async fn keyspace(
    Extension(router): Extension<Arc<KeyRouter>>,
    Extension(controller): Extension<Arc<MembershipController>>,
    Query(params): Query<KeyspaceParams>,
) -> DhtResult<Json<Vec<String>>> {
    controller.ensure_serving()?;
    let keys = match (params.lower_bound, params.upper_bound) {
        (None, None) => router.network_keys().await?,
        (Some(lower), Some(upper)) => {
            let lower = parse_bound("lower_bound", &lower)?;
            let upper = parse_bound("upper_bound", &upper)?;
            router.keyspace_range(lower, upper).await?
        }
        _ => {
            return Err(DhtError::MalformedInput(
                "lower_bound and upper_bound must be given together".to_string(),
            ));
        }
    };
    Ok(Json(keys))
}

// --- Membership operations ---

pub async fn peers(Extension(controller): Extension<Arc<MembershipController>>) -> String {
    controller.peers_wire()
}

pub async fn initialize(
    Extension(controller): Extension<Arc<MembershipController>>,
    body: String,
) -> DhtResult<String> {
    let members = controller.initialize(&body).await?;
    Ok(format!("initialized ring with {} member(s)\n", members.len()))
}

pub async fn join(
    Extension(controller): Extension<Arc<MembershipController>>,
    body: String,
) -> DhtResult<String> {
    let moved = controller.join(&body).await?;
    Ok(format!("joined the network, took over {moved} key(s)\n"))
}

pub async fn add_peers(
    Extension(controller): Extension<Arc<MembershipController>>,
    body: String,
) -> DhtResult<String> {
    let added = controller.add_peers(&body).await?;
    Ok(format!("added {added} peer(s)\n"))
}

pub async fn leave(
    Extension(controller): Extension<Arc<MembershipController>>,
) -> DhtResult<String> {
    let moved = controller.leave().await?;
    Ok(format!(
        "left the network, handed {moved} key(s) to the successor\n"
    ))
}

pub async fn remove_peer(
    Extension(controller): Extension<Arc<MembershipController>>,
    Path(id): Path<String>,
) -> DhtResult<String> {
    let removed = controller.remove_peer(&id).await?;
    Ok(if removed {
        format!("removed peer {id}\n")
    } else {
        format!("peer {id} was not in the table\n")
    })
}

// --- Inter-node migration ---

pub async fn migrate(
    Extension(controller): Extension<Arc<MembershipController>>,
    Json(request): Json<MigrateRequest>,
) -> DhtResult<Json<MigrateResponse>> {
    let applied = controller.apply_migration(request)?;
    Ok(Json(MigrateResponse { applied }))
}

pub async fn handoff(
    Extension(controller): Extension<Arc<MembershipController>>,
    Json(request): Json<HandoffRequest>,
) -> DhtResult<Json<HandoffResponse>> {
    let moved = controller.handoff(request).await?;
    Ok(Json(HandoffResponse { moved }))
}
