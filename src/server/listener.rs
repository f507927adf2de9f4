use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::connection;
use super::registry::Connections;
use crate::coordination::types::Node;
use crate::routing::table::RoutingTable;

/// The listening side of a node: accepts client sockets and hands each one
/// to its own connection task.
pub struct Server {
    local: Node,
    table: Arc<RoutingTable>,
    connections: Arc<Connections>,
}

impl Server {
    pub fn new(local: Node, table: Arc<RoutingTable>, connections: Arc<Connections>) -> Arc<Self> {
        Arc::new(Self {
            local,
            table,
            connections,
        })
    }

    pub fn local(&self) -> &Node {
        &self.local
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    /// Binds the node's listening socket. Called once at startup; a failure
    /// here is fatal for the launcher.
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        let listener = TcpListener::bind((self.local.host.as_str(), self.local.port)).await?;
        tracing::info!("Node {} listening on {}", self.local.id, self.local.address());
        Ok(listener)
    }

    pub fn start(self: &Arc<Self>, listener: TcpListener) -> JoinHandle<()> {
        let server = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        tracing::debug!("Accepted connection from {}", peer);
                        let server = Arc::clone(&server);
                        tokio::spawn(async move {
                            connection::run(stream, server).await;
                        });
                    }
                    Err(error) => {
                        tracing::error!("Error while accepting connection: {}", error);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        })
    }
}
