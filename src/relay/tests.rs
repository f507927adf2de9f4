//! Relay Module Tests
//!
//! Validates record parsing and the partition filter of the in-process
//! relay, including full-replacement assignment semantics.

#[cfg(test)]
mod tests {
    use crate::relay::{InProcessRelay, RelayConsumer, RelayMessage};
    use crate::ring::{HashRing, PartitionRange};

    const PARTITIONS: u32 = 256;

    #[test]
    fn test_record_parsing() {
        assert_eq!(
            RelayMessage::parse("17|hello"),
            Some(RelayMessage {
                client_id: 17,
                payload: "hello".to_string()
            })
        );
        // Only the first pipe delimits; the payload keeps the rest verbatim.
        assert_eq!(
            RelayMessage::parse("17|a|b|c"),
            Some(RelayMessage {
                client_id: 17,
                payload: "a|b|c".to_string()
            })
        );
        assert_eq!(RelayMessage::parse("not-a-number|x"), None);
        assert_eq!(RelayMessage::parse("nodelimiter"), None);
    }

    #[test]
    fn test_records_are_dropped_until_partitions_are_assigned() {
        let ring = HashRing::new(PARTITIONS, 16);
        let (relay, mut rx) = InProcessRelay::new(ring);

        relay.offer("42|early");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_records_are_filtered_by_assigned_partitions() {
        let ring = HashRing::new(PARTITIONS, 16);
        let partition = ring.partition_of(42);
        let (relay, mut rx) = InProcessRelay::new(ring);

        relay.assign(vec![PartitionRange::new(0, PARTITIONS)]);
        relay.offer("42|owned");
        assert_eq!(
            rx.try_recv().expect("record in an assigned partition"),
            RelayMessage {
                client_id: 42,
                payload: "owned".to_string()
            }
        );

        // Replace the assignment with everything except client 42's
        // partition: the next record must be dropped. This also proves the
        // assignment is replaced, not merged.
        let mut without = Vec::new();
        if partition > 0 {
            without.push(PartitionRange::new(0, partition));
        }
        if partition + 1 < PARTITIONS {
            without.push(PartitionRange::new(partition + 1, PARTITIONS));
        }
        relay.assign(without);
        relay.offer("42|revoked");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_malformed_records_are_dropped() {
        let ring = HashRing::new(PARTITIONS, 16);
        let (relay, mut rx) = InProcessRelay::new(ring);
        relay.assign(vec![PartitionRange::new(0, PARTITIONS)]);

        relay.offer("garbage");
        relay.offer("x|y");
        assert!(rx.try_recv().is_err());
    }
}
