use anyhow::Context;

use shard_router::client::ClientContainer;
use shard_router::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <clientsCount> <host:port> [<host:port>...]", args[0]);
        eprintln!("Example: {} 100 localhost:12001 localhost:12002", args[0]);
        std::process::exit(1);
    }
    let clients_count: u32 = args[1]
        .parse()
        .context("<clientsCount> must be an integer")?;
    let mut addresses = Vec::new();
    for raw in &args[2..] {
        let (host, port) = raw
            .rsplit_once(':')
            .with_context(|| format!("address {raw:?} must be host:port"))?;
        let port: u16 = port
            .parse()
            .with_context(|| format!("address {raw:?} has an invalid port"))?;
        addresses.push((host.to_string(), port));
    }

    let config = Config::from_env();
    tracing::info!(
        "Starting client container with {} logical clients against {} nodes",
        clients_count,
        addresses.len()
    );
    let container = ClientContainer::new(clients_count, addresses);
    container.start(config.spawn_delay, config.decommission_delay);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    container.stop();

    Ok(())
}
