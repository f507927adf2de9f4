use std::sync::Arc;

use anyhow::Context;

use shard_router::config::Config;
use shard_router::coordination::types::{Node, NodeId};
use shard_router::coordination::{Coordinator, MemoryBackend};
use shard_router::relay::{self, InProcessRelay};
use shard_router::ring::HashRing;
use shard_router::routing::{Orchestrator, RoutingTable};
use shard_router::server::{Connections, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <nodeId> <host> <port>", args[0]);
        eprintln!("Example:");
        eprintln!("First  node: {} 0 localhost 12001", args[0]);
        eprintln!("Second node: {} 1 localhost 12002", args[0]);
        std::process::exit(1);
    }
    let node_id: NodeId = args[1].parse().context("<nodeId> must be an integer")?;
    let host = args[2].clone();
    let port: u16 = args[3].parse().context("<port> must be a port number")?;

    let config = Config::from_env();
    let local = Node::new(node_id, host, port);
    tracing::info!("Starting node {}", local);

    let ring = HashRing::new(config.partitions_count, config.split_points_per_node);
    let table = RoutingTable::new(ring.clone());
    let connections = Connections::new();
    let server = Server::new(local.clone(), Arc::clone(&table), Arc::clone(&connections));

    // Bind and reach the coordination service before anything else; failing
    // either is fatal at startup, never later.
    let listener = server
        .bind()
        .await
        .with_context(|| format!("failed to bind {}", local.address()))?;
    let backend = MemoryBackend::new();
    let coordinator = Coordinator::new(Arc::clone(&backend));
    coordinator
        .start()
        .await
        .context("failed to reach the coordination service")?;

    server.start(listener);

    let (relay_consumer, relay_rx) = InProcessRelay::new(ring);
    let orchestrator = Orchestrator::new(
        local,
        table,
        Arc::clone(&coordinator),
        connections,
        relay_consumer.clone(),
    );
    orchestrator.start(relay_rx).await;

    relay::spawn_periodic_producer(relay_consumer, config.clients_count, config.produce_delay);

    tracing::info!("Node started. Press Ctrl+C to shut down");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutting down node");
    orchestrator.shutdown().await;

    Ok(())
}
