//! Protocol Module Tests
//!
//! Validates the length-framed codec both ways and its failure behavior.
//!
//! ## Test Scopes
//! - **Round-trip**: Encoding then decoding yields the original frame, for
//!   any delivery chunking.
//! - **Robustness**: Corrupt length prefixes are fatal, unrecognized types
//!   are dropped without losing the frames behind them.
//! - **Backpressure**: The writer accounts for queued-but-unsent bytes.

#[cfg(test)]
mod tests {
    use bytes::BufMut;

    use crate::protocol::{
        Frame, FrameDecoder, FrameError, FrameKind, FrameWriter, Resolution, MAX_FRAME_LEN,
    };

    fn decode_all(decoder: &mut FrameDecoder) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = decoder.next_frame().expect("decode error") {
            frames.push(frame);
        }
        frames
    }

    // ============================================================
    // ROUND-TRIP
    // ============================================================

    #[test]
    fn test_frame_round_trip() {
        let frames = vec![
            Frame::resolve("17"),
            Frame::resolve("host1:12001"),
            Frame::data("some payload"),
        ];

        let mut decoder = FrameDecoder::new();
        for frame in &frames {
            decoder.extend(&frame.encode());
        }
        assert_eq!(decode_all(&mut decoder), frames);
    }

    #[test]
    fn test_partial_delivery_matches_single_shot() {
        let frames = vec![
            Frame::resolve("42"),
            Frame::data("first"),
            Frame::data("second payload, somewhat longer"),
            Frame::resolve("unknown"),
        ];
        let mut wire = Vec::new();
        for frame in &frames {
            wire.extend_from_slice(&frame.encode());
        }

        // Byte-at-a-time delivery.
        let mut decoder = FrameDecoder::new();
        let mut received = Vec::new();
        for byte in &wire {
            decoder.extend(std::slice::from_ref(byte));
            received.extend(decode_all(&mut decoder));
        }
        assert_eq!(received, frames);

        // Arbitrary chunk sizes, including ones that straddle length
        // prefixes and payload boundaries.
        for chunk_len in [2usize, 3, 5, 7, 11] {
            let mut decoder = FrameDecoder::new();
            let mut received = Vec::new();
            for chunk in wire.chunks(chunk_len) {
                decoder.extend(chunk);
                received.extend(decode_all(&mut decoder));
            }
            assert_eq!(received, frames, "chunk length {chunk_len}");
        }
    }

    #[test]
    fn test_data_body_may_contain_pipes() {
        let frame = Frame::data("a|b|c");
        let mut decoder = FrameDecoder::new();
        decoder.extend(&frame.encode());

        let decoded = decoder.next_frame().unwrap().unwrap();
        assert_eq!(decoded.kind, FrameKind::Data);
        assert_eq!(decoded.body, "a|b|c");
    }

    #[test]
    fn test_empty_body_round_trips() {
        let frame = Frame::data("");
        let mut decoder = FrameDecoder::new();
        decoder.extend(&frame.encode());
        assert_eq!(decoder.next_frame().unwrap().unwrap(), frame);
    }

    // ============================================================
    // FAILURE BEHAVIOR
    // ============================================================

    #[test]
    fn test_oversized_length_prefix_is_fatal() {
        let mut wire = Vec::new();
        wire.put_u32((MAX_FRAME_LEN + 1) as u32);
        wire.put_slice(b"whatever");

        let mut decoder = FrameDecoder::new();
        decoder.extend(&wire);
        let error = decoder.next_frame().unwrap_err();
        assert!(matches!(error, FrameError::Oversized(_)));
        assert!(error.is_fatal());
    }

    #[test]
    fn test_unknown_type_is_dropped_but_not_fatal() {
        let mut wire = Vec::new();
        let bogus = b"bogus|payload";
        wire.put_u32(bogus.len() as u32);
        wire.put_slice(bogus);
        wire.extend_from_slice(&Frame::resolve("9").encode());

        let mut decoder = FrameDecoder::new();
        decoder.extend(&wire);

        let error = decoder.next_frame().unwrap_err();
        assert!(matches!(error, FrameError::UnknownType(_)));
        assert!(!error.is_fatal());
        // The frame behind the dropped one is intact.
        assert_eq!(decoder.next_frame().unwrap().unwrap(), Frame::resolve("9"));
    }

    #[test]
    fn test_undecodable_payload_is_fatal() {
        let mut wire = Vec::new();
        wire.put_u32(4);
        wire.put_slice(&[0xFF, 0xFE, 0x00, 0x01]);

        let mut decoder = FrameDecoder::new();
        decoder.extend(&wire);
        let error = decoder.next_frame().unwrap_err();
        assert!(matches!(error, FrameError::Encoding(_)));
        assert!(error.is_fatal());
    }

    #[test]
    fn test_missing_delimiter_is_dropped_but_not_fatal() {
        let mut wire = Vec::new();
        let bogus = b"nodelimiter";
        wire.put_u32(bogus.len() as u32);
        wire.put_slice(bogus);

        let mut decoder = FrameDecoder::new();
        decoder.extend(&wire);
        let error = decoder.next_frame().unwrap_err();
        assert!(matches!(error, FrameError::MissingDelimiter));
        assert!(!error.is_fatal());
    }

    // ============================================================
    // RESOLUTION BODIES
    // ============================================================

    #[test]
    fn test_resolution_bodies() {
        assert_eq!(Resolution::from_body("unknown").unwrap(), Resolution::Unknown);
        assert_eq!(
            Resolution::from_body("host1:12001").unwrap(),
            Resolution::Owner {
                host: "host1".to_string(),
                port: 12001
            }
        );
        // The last colon splits host from port, so colons in the host survive.
        assert_eq!(
            Resolution::from_body("::1:8080").unwrap(),
            Resolution::Owner {
                host: "::1".to_string(),
                port: 8080
            }
        );
        assert!(Resolution::from_body("no-port").is_err());
        assert!(Resolution::from_body("host:notaport").is_err());
    }

    #[test]
    fn test_resolution_to_frame() {
        assert_eq!(Resolution::Unknown.to_frame(), Frame::resolve("unknown"));
        let owner = Resolution::Owner {
            host: "host1".to_string(),
            port: 12001,
        };
        assert_eq!(owner.to_frame(), Frame::resolve("host1:12001"));
        assert_eq!(Resolution::from_body(&owner.to_frame().body).unwrap(), owner);
    }

    #[test]
    fn test_client_id_parsing() {
        assert_eq!(Frame::resolve("17").client_id().unwrap(), 17);
        assert!(Frame::resolve("seventeen").client_id().is_err());
    }

    // ============================================================
    // WRITER
    // ============================================================

    #[test]
    fn test_writer_tracks_pending_bytes() {
        let mut writer = FrameWriter::new();
        assert!(!writer.has_pending());

        let first = Frame::resolve("1");
        let second = Frame::data("payload");
        writer.queue(&first);
        writer.queue(&second);

        let mut expected = Vec::new();
        expected.extend_from_slice(&first.encode());
        expected.extend_from_slice(&second.encode());
        assert!(writer.has_pending());
        assert_eq!(writer.pending(), expected.as_slice());
    }
}
