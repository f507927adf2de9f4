//! Client Side of the Resolve Protocol
//!
//! A [`ClientContainer`] hosts many logical clients. Each client connects to
//! some seed node, asks which node owns its id, and follows the redirect if
//! the answer names a different node. A rebalance that moves the client's
//! shard shows up as a server-side disconnect, after which the client
//! re-resolves from a seed.
//!
//! Connection failures are retried against the seed list with a small fixed
//! budget per logical client; exhausting it abandons the client with an
//! error log, never the process.

pub mod container;
pub mod session;

pub use container::{ClientContainer, MAX_CONNECT_RETRIES};

#[cfg(test)]
mod tests;
