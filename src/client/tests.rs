//! Client Module Tests
//!
//! Runs logical clients against real servers: resolution, redirect
//! following, retry-on-unknown, the reconnect budget, and decommissioning.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::net::TcpListener;

    use crate::client::ClientContainer;
    use crate::coordination::types::{CoordinatedNode, Node};
    use crate::ring::HashRing;
    use crate::routing::RoutingTable;
    use crate::server::{Connections, Server};

    const PARTITIONS: u32 = 256;

    async fn start_server(node_id: u32) -> (Arc<Server>, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let local = Node::new(node_id, "127.0.0.1", port);
        let table = RoutingTable::new(HashRing::new(PARTITIONS, 16));
        let connections = Connections::new();
        let server = Server::new(local, table, connections);
        server.start(listener);
        (server, port)
    }

    fn member(node_id: u32, port: u16, split_points: Vec<u32>) -> CoordinatedNode {
        CoordinatedNode::new(Node::new(node_id, "127.0.0.1", port), split_points)
    }

    async fn eventually<F: Fn() -> bool>(condition: F, what: &str) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time: {what}");
    }

    #[tokio::test]
    async fn test_client_resolves_and_registers_with_the_owner() {
        let (server, port) = start_server(0).await;
        server.table().install(&[member(0, port, vec![40])]);

        let container = ClientContainer::new(100, vec![("127.0.0.1".to_string(), port)]);
        container.spawn_client(7, "127.0.0.1".to_string(), port);

        eventually(|| server.connections().contains(7), "client 7 registered").await;
        assert!(container.is_active(7));
    }

    #[tokio::test]
    async fn test_client_follows_a_redirect_to_the_owning_node() {
        let (server_a, port_a) = start_server(0).await;
        let (server_b, port_b) = start_server(1).await;

        // Client 7's partition belongs to node 1; both nodes share the view.
        let ring = HashRing::new(PARTITIONS, 16);
        let partition = ring.partition_of(7);
        let other_split = (partition + PARTITIONS / 2) % PARTITIONS;
        let members = vec![
            member(0, port_a, vec![other_split]),
            member(1, port_b, vec![partition]),
        ];
        server_a.table().install(&members);
        server_b.table().install(&members);

        // The client only knows node 0 and must be redirected.
        let container = ClientContainer::new(100, vec![("127.0.0.1".to_string(), port_a)]);
        container.spawn_client(7, "127.0.0.1".to_string(), port_a);

        eventually(
            || server_b.connections().contains(7),
            "client 7 registered with the owning node",
        )
        .await;
        assert!(!server_a.connections().contains(7));
    }

    #[tokio::test]
    async fn test_client_retries_resolution_until_an_owner_is_known() {
        let (server, port) = start_server(0).await;
        // No snapshot yet: the server keeps answering `unknown`.
        let container = ClientContainer::new(100, vec![("127.0.0.1".to_string(), port)]);
        container.spawn_client(7, "127.0.0.1".to_string(), port);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!server.connections().contains(7));

        server.table().install(&[member(0, port, vec![40])]);
        eventually(
            || server.connections().contains(7),
            "client 7 registered once ownership arrived",
        )
        .await;
    }

    #[tokio::test]
    async fn test_client_gives_up_after_the_reconnect_budget() {
        // Grab a port nobody is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let container = ClientContainer::new(100, vec![("127.0.0.1".to_string(), port)]);
        container.spawn_client(3, "127.0.0.1".to_string(), port);
        assert!(container.is_active(3));

        eventually(
            || !container.is_active(3),
            "client 3 abandoned after exhausting its retry budget",
        )
        .await;
    }

    #[tokio::test]
    async fn test_decommission_closes_the_connection_on_both_sides() {
        let (server, port) = start_server(0).await;
        server.table().install(&[member(0, port, vec![40])]);

        let container = ClientContainer::new(100, vec![("127.0.0.1".to_string(), port)]);
        container.spawn_client(7, "127.0.0.1".to_string(), port);
        eventually(|| server.connections().contains(7), "client 7 registered").await;

        container.decommission(7);
        assert!(!container.is_active(7));
        eventually(
            || !server.connections().contains(7),
            "server forgets the decommissioned client",
        )
        .await;
    }

    #[tokio::test]
    async fn test_spawning_an_active_client_is_a_no_op() {
        let (server, port) = start_server(0).await;
        server.table().install(&[member(0, port, vec![40])]);

        let container = ClientContainer::new(100, vec![("127.0.0.1".to_string(), port)]);
        container.spawn_client(7, "127.0.0.1".to_string(), port);
        eventually(|| server.connections().contains(7), "client 7 registered").await;

        container.spawn_client(7, "127.0.0.1".to_string(), port);
        assert_eq!(container.active_clients(), vec![7]);
    }
}
