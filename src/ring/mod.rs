//! Consistent-Hash Ring
//!
//! Maps shard keys to partitions and partitions to owning nodes. Every node
//! contributes a handful of pseudo-random "split points" (virtual nodes) to
//! the ring, which keeps load roughly uniform and bounds the fraction of
//! keys that move on a membership change to about `1/nodeCount`.
//!
//! The ring itself is derived state: a [`RingSnapshot`] is rebuilt from the
//! latest membership snapshot on every update and never mutated in place.

pub mod hash_ring;

pub use hash_ring::{HashRing, PartitionRange, RingError, RingSnapshot};
