//! Message-Queue Collaborator Boundary
//!
//! The node does not speak to a real message queue; it only needs two things
//! from one: a way to (re)assign the partitions this node consumes, and a
//! stream of `clientId|payload` records for those partitions. The
//! [`RelayConsumer`] trait is that boundary, and [`InProcessRelay`] is the
//! bundled in-process implementation used by the launchers and tests.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ring::{HashRing, PartitionRange};

#[cfg(test)]
mod tests;

/// One application payload addressed to a logical client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    pub client_id: u32,
    pub payload: String,
}

impl RelayMessage {
    /// Parses a `clientId|payload` record. The payload is everything after
    /// the first pipe, verbatim.
    pub fn parse(record: &str) -> Option<Self> {
        let (client_id, payload) = record.split_once('|')?;
        Some(Self {
            client_id: client_id.trim().parse().ok()?,
            payload: payload.to_string(),
        })
    }
}

/// Consumer side of the message-queue collaborator.
pub trait RelayConsumer: Send + Sync + 'static {
    /// Replaces the consumer's full partition assignment. The new set is
    /// authoritative; nothing from the previous assignment survives.
    fn assign(&self, partitions: Vec<PartitionRange>);
}

/// In-process relay: records offered to it are filtered by the assigned
/// partitions and forwarded into the node's delivery channel.
pub struct InProcessRelay {
    ring: HashRing,
    assigned: Mutex<Option<Vec<PartitionRange>>>,
    out: mpsc::UnboundedSender<RelayMessage>,
}

impl InProcessRelay {
    pub fn new(ring: HashRing) -> (Arc<Self>, mpsc::UnboundedReceiver<RelayMessage>) {
        let (out, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                ring,
                assigned: Mutex::new(None),
                out,
            }),
            rx,
        )
    }

    /// Offers one record to the relay. Records outside the assigned
    /// partitions are dropped, as a real consumer would never see them.
    pub fn offer(&self, record: &str) {
        let Some(message) = RelayMessage::parse(record) else {
            tracing::warn!("Discarding malformed relay record {:?}", record);
            return;
        };
        let partition = self.ring.partition_of(message.client_id);
        let assigned = self.assigned.lock();
        let owned = assigned
            .as_ref()
            .map(|ranges| ranges.iter().any(|range| range.contains(partition)))
            .unwrap_or(false);
        if owned {
            let _ = self.out.send(message);
        }
    }
}

impl RelayConsumer for InProcessRelay {
    fn assign(&self, partitions: Vec<PartitionRange>) {
        let mut assigned = self.assigned.lock();
        if let Some(previous) = assigned.as_ref() {
            let (lost, acquired) = assignment_delta(previous, &partitions, &self.ring);
            tracing::info!(
                "Relay consumer lost {} and acquired {} partitions",
                lost,
                acquired
            );
        }
        tracing::info!("Updating relay partition assignment to {:?}", partitions);
        *assigned = Some(partitions);
    }
}

fn assignment_delta(
    previous: &[PartitionRange],
    next: &[PartitionRange],
    ring: &HashRing,
) -> (u32, u32) {
    let covered =
        |ranges: &[PartitionRange], p: u32| ranges.iter().any(|range| range.contains(p));
    let mut lost = 0;
    let mut acquired = 0;
    for partition in 0..ring.partitions_count() {
        match (covered(previous, partition), covered(next, partition)) {
            (true, false) => lost += 1,
            (false, true) => acquired += 1,
            _ => {}
        }
    }
    (lost, acquired)
}

/// Feeds the relay with generated payloads for random clients, standing in
/// for an external producer during local runs.
pub fn spawn_periodic_producer(
    relay: Arc<InProcessRelay>,
    clients_count: u32,
    delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(delay);
        let mut sequence = 0u64;
        loop {
            ticker.tick().await;
            let client_id = rand::thread_rng().gen_range(0..clients_count);
            let record = format!("{}|payload-{}", client_id, sequence);
            sequence += 1;
            relay.offer(&record);
        }
    })
}
