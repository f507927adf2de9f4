use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use rand::Rng;
use thiserror::Error;

use crate::coordination::types::{CoordinatedNode, NodeId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RingError {
    /// The ring has no entries, so no partition has an owner.
    #[error("no owner available: the ring has no registered nodes")]
    NoOwnerAvailable,
}

/// A half-open run of partitions `[from, to)` owned by one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionRange {
    pub from: u32,
    pub to: u32,
}

impl PartitionRange {
    pub fn new(from: u32, to: u32) -> Self {
        Self { from, to }
    }

    pub fn len(&self) -> u32 {
        self.to - self.from
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    pub fn contains(&self, partition: u32) -> bool {
        self.from <= partition && partition < self.to
    }
}

/// Ring geometry: the size of the partition space and how many virtual split
/// points each node contributes.
#[derive(Debug, Clone)]
pub struct HashRing {
    partitions_count: u32,
    split_points_per_node: usize,
}

impl HashRing {
    pub fn new(partitions_count: u32, split_points_per_node: usize) -> Self {
        Self {
            partitions_count,
            split_points_per_node,
        }
    }

    pub fn partitions_count(&self) -> u32 {
        self.partitions_count
    }

    /// Generates this node's virtual positions on the ring: distinct
    /// pseudo-random partitions, sorted ascending. Generated once at join
    /// time and kept for the node's entire membership lifetime.
    pub fn generate_split_points(&self, node_id: NodeId) -> Vec<u32> {
        let wanted = self.split_points_per_node.min(self.partitions_count as usize);
        let mut rng = rand::thread_rng();
        let mut points = BTreeSet::new();
        while points.len() < wanted {
            points.insert(rng.gen_range(0..self.partitions_count));
        }
        let points: Vec<u32> = points.into_iter().collect();
        tracing::info!("Generated split points {:?} for node {}", points, node_id);
        points
    }

    /// Maps a shard key (a client id) to its partition.
    pub fn partition_of(&self, client_id: u32) -> u32 {
        let mut hasher = DefaultHasher::new();
        client_id.hash(&mut hasher);
        (hasher.finish() % u64::from(self.partitions_count)) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct RingEntry {
    split_point: u32,
    node_id: NodeId,
}

/// The sorted set of all split points contributed by the current membership.
///
/// Always rebuilt from the latest membership snapshot; lookups never observe
/// a partially-updated ring.
#[derive(Debug, Clone, Default)]
pub struct RingSnapshot {
    entries: Vec<RingEntry>,
}

impl RingSnapshot {
    pub fn from_nodes<'a, I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = &'a CoordinatedNode>,
    {
        let mut entries: Vec<RingEntry> = nodes
            .into_iter()
            .flat_map(|member| {
                let node_id = member.id();
                member.split_points.iter().map(move |&split_point| RingEntry {
                    split_point,
                    node_id,
                })
            })
            .collect();
        entries.sort_unstable();
        entries.dedup();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves the owner of a partition: the least entry whose split point
    /// is `>= partition`, wrapping to the smallest entry past the end of the
    /// ring. Entries sharing a split point tie-break on the smaller node id.
    pub fn owner_of(&self, partition: u32) -> Result<NodeId, RingError> {
        if self.entries.is_empty() {
            return Err(RingError::NoOwnerAvailable);
        }
        let idx = self
            .entries
            .partition_point(|entry| entry.split_point < partition);
        let entry = self.entries.get(idx).unwrap_or(&self.entries[0]);
        Ok(entry.node_id)
    }

    /// Computes the contiguous partition ranges owned by `node_id`, walking
    /// the sorted ring once. Adjacent runs with the same owner are merged,
    /// including the wraparound tail past the last split point, which belongs
    /// to the smallest entry.
    pub fn ranges_of(&self, node_id: NodeId, partitions_count: u32) -> Vec<PartitionRange> {
        if self.entries.is_empty() {
            return Vec::new();
        }

        let mut runs: Vec<(NodeId, PartitionRange)> = Vec::new();
        let mut from = 0u32;
        let mut previous_split = None;
        for entry in &self.entries {
            if previous_split == Some(entry.split_point) {
                // Same split point as the previous entry: the smaller node id
                // already claimed it.
                continue;
            }
            previous_split = Some(entry.split_point);
            let to = (entry.split_point + 1).min(partitions_count);
            if to > from {
                push_run(&mut runs, entry.node_id, PartitionRange::new(from, to));
                from = to;
            }
        }
        if from < partitions_count {
            push_run(
                &mut runs,
                self.entries[0].node_id,
                PartitionRange::new(from, partitions_count),
            );
        }

        runs.into_iter()
            .filter(|(owner, _)| *owner == node_id)
            .map(|(_, range)| range)
            .collect()
    }
}

fn push_run(runs: &mut Vec<(NodeId, PartitionRange)>, owner: NodeId, range: PartitionRange) {
    match runs.last_mut() {
        Some((previous_owner, previous_range))
            if *previous_owner == owner && previous_range.to == range.from =>
        {
            previous_range.to = range.to;
        }
        _ => runs.push((owner, range)),
    }
}
