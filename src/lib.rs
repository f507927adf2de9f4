//! Sharded Connection-Routing Cluster Library
//!
//! This library crate defines the core modules of a self-rebalancing,
//! sharded connection-routing layer. A fleet of peer nodes jointly owns a
//! fixed partition space; clients resolve and connect to the node that
//! currently owns their shard, and ownership redistributes automatically as
//! nodes join or leave.
//!
//! ## Architecture Modules
//!
//! - **`ring`**: The consistent-hash ring. Maps shard keys to partitions and
//!   partitions to owning nodes via per-node virtual split points.
//! - **`coordination`**: The cluster membership layer. Publishes each node's
//!   ephemeral membership record to a coordination service, watches for
//!   cluster-wide changes, and buffers join/leave operations across
//!   partitions and session loss.
//! - **`protocol`**: The length-framed resolve/redirect wire codec shared by
//!   client and server, including the partial-write backpressure buffer.
//! - **`server`**: The listening node. Accepts client connections, answers
//!   resolve requests, and tracks the clients this node currently owns.
//! - **`client`**: The client container. Spawns logical clients that resolve
//!   their owning node and follow redirects, with a bounded reconnect budget.
//! - **`routing`**: The composition point. Consumes membership updates,
//!   recomputes owned partitions, reassigns the relay consumer, and evicts
//!   clients this node no longer owns.
//! - **`relay`**: The message-queue collaborator boundary used to deliver
//!   application payloads to connected clients.

pub mod client;
pub mod config;
pub mod coordination;
pub mod protocol;
pub mod relay;
pub mod ring;
pub mod routing;
pub mod server;
