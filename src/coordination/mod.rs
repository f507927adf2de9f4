//! Cluster Coordination Layer
//!
//! Keeps each node's membership record in a shared coordination service and
//! watches for cluster-wide membership changes.
//!
//! ## Core Concepts
//! - **Ephemeral records**: A node's membership record disappears from the
//!   service when its session dies. That disappearance is the only
//!   node-failure signal in the system; there is no heartbeat at this layer.
//! - **Pending operations**: Join/leave requests issued while the service is
//!   unreachable or read-only are queued and replayed in submission order
//!   once writes are possible again.
//! - **Snapshots**: On every change notification the full membership state is
//!   re-read and fanned out to subscribers. There is no incremental diffing;
//!   the snapshot read is authoritative.

pub mod backend;
pub mod coordinator;
pub mod memory;
pub mod types;

pub use backend::{BackendError, CoordinationBackend};
pub use coordinator::Coordinator;
pub use memory::MemoryBackend;
