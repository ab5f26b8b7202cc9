//! Stateful FLAP framer: owns the per-connection sequence counter.
//!
//! Both the dispatcher's inbound-reply path and its outbound-relay path must
//! write through the *same* [`FlapClient`] instance so the sequence counter
//! advances atomically across the two — that's the whole point of giving it
//! its own type instead of threading a bare `u16` through the dispatcher.

use bytes::{Bytes, BytesMut};
use oscar_proto::{FlapFrame, FlapFrameType, ProtocolError, SnacFrame};

/// Owns the monotonically increasing FLAP sequence counter for one
/// connection.
///
/// # Invariants
///
/// - `next_sequence()` returns a value one greater than the previous call,
///   wrapping at `u16::MAX` back to `0`, regardless of frame type.
#[derive(Debug, Default)]
pub struct FlapClient {
    sequence: u16,
}

impl FlapClient {
    /// A fresh framer, sequence starting at 0.
    #[must_use]
    pub fn new() -> Self {
        Self { sequence: 0 }
    }

    fn next_sequence(&mut self) -> u16 {
        let seq = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        seq
    }

    /// Encode a raw payload as a FLAP frame of the given type, consuming the
    /// next sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::OversizePayload`] if `payload` cannot fit in
    /// a FLAP frame.
    pub fn encode_frame(
        &mut self,
        frame_type: FlapFrameType,
        payload: Bytes,
    ) -> Result<BytesMut, ProtocolError> {
        let frame = FlapFrame::new(frame_type, self.next_sequence(), payload);
        let mut buf = BytesMut::new();
        frame.encode(&mut buf)?;
        Ok(buf)
    }

    /// Encode a SNAC as a `Data` frame, consuming the next sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::OversizePayload`] if the encoded SNAC cannot
    /// fit in a FLAP frame.
    pub fn encode_snac(&mut self, snac: &SnacFrame) -> Result<BytesMut, ProtocolError> {
        let mut body = BytesMut::new();
        snac.encode(&mut body);
        self.encode_frame(FlapFrameType::Data, body.freeze())
    }
}

#[cfg(test)]
mod tests {
    use oscar_proto::{SnacHeader, FLAP_HEADER_SIZE};

    use super::*;

    #[test]
    fn sequence_advances_across_frame_types() {
        let mut client = FlapClient::new();
        let first = client.encode_frame(FlapFrameType::Data, Bytes::new()).unwrap();
        let second = client.encode_frame(FlapFrameType::KeepAlive, Bytes::new()).unwrap();

        let first_header = FlapFrame::decode_header(&first).unwrap();
        let second_header = FlapFrame::decode_header(&second).unwrap();
        assert_eq!(first_header.sequence(), 0);
        assert_eq!(second_header.sequence(), 1);
    }

    #[test]
    fn sequence_wraps_at_u16_max() {
        let mut client = FlapClient { sequence: u16::MAX };
        let frame = client.encode_frame(FlapFrameType::KeepAlive, Bytes::new()).unwrap();
        let header = FlapFrame::decode_header(&frame).unwrap();
        assert_eq!(header.sequence(), u16::MAX);
        assert_eq!(client.sequence, 0);
    }

    #[test]
    fn encode_snac_prefixes_flap_header() {
        let mut client = FlapClient::new();
        let header = SnacHeader { food_group: 1, sub_group: 1, flags: 0, request_id: 1 };
        let snac = SnacFrame::new(header, Bytes::new());
        let encoded = client.encode_snac(&snac).unwrap();
        assert!(encoded.len() >= FLAP_HEADER_SIZE + oscar_proto::SNAC_HEADER_SIZE);
    }
}
