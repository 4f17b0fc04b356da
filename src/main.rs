use std::net::IpAddr;

use dht_node::ring::hash::HashRing;
use dht_node::ring::table::NodeId;
use dht_node::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut host: IpAddr = "0.0.0.0".parse()?;
    let mut port: u16 = 8000;
    let mut advertise: Option<NodeId> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--host" if i + 1 < args.len() => {
                host = args[i + 1].parse()?;
                i += 2;
            }
            "--port" if i + 1 < args.len() => {
                port = args[i + 1].parse()?;
                i += 2;
            }
            "--advertise" if i + 1 < args.len() => {
                advertise = Some(NodeId::parse(&args[i + 1])?);
                i += 2;
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                eprintln!(
                    "Usage: {} [--host <ip>] [--port <port>] [--advertise <host:port>]",
                    args[0]
                );
                eprintln!("Example: {} --port 8000", args[0]);
                eprintln!(
                    "Example: {} --port 8001 --advertise 127.0.0.1:8001",
                    args[0]
                );
                std::process::exit(1);
            }
        }
    }

    // Without --advertise the node learns its own address from the first
    // inbound request.
    let (app, controller, _router) = server::build_node(HashRing::default(), advertise);

    let listener = server::bind_with_retry(host, port).await?;
    let local = listener.local_addr()?;
    tracing::info!("DHT node serving on {local}");
    if let Some(peer) = controller.identity().get() {
        tracing::info!(
            "advertised as {} at ring position {}",
            peer.id,
            peer.position
        );
    }

    axum::serve(listener, app).await?;

    Ok(())
}
