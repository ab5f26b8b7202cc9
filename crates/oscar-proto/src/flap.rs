//! FLAP framing: the outermost envelope of every byte on an OSCAR connection.
//!
//! A FLAP frame is six header bytes followed by `payload_len` bytes of
//! payload: `{marker: u8, frame_type: u8, sequence: u16be, payload_len: u16be}`.
//! For [`FlapFrameType::Data`] frames the payload is itself a SNAC (see
//! [`crate::snac`]); every other frame type carries a TLV block or nothing.

use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::ProtocolError;

/// Fixed FLAP start-of-frame marker.
pub const FLAP_MARKER: u8 = 0x2A;

/// Hard cap on FLAP payload size: the 16-bit length field's maximum value.
/// Period clients never send frames anywhere near this size; the cap exists
/// purely to reject corrupt length fields before an allocation is attempted.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// FLAP frame type, carried in the header's second byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlapFrameType {
    /// Signon: carries the FLAP version and login TLVs.
    SignOn = 1,
    /// Data: payload is a SNAC.
    Data = 2,
    /// Error: fatal, terminates the connection.
    Error = 3,
    /// Signoff: clean termination, may carry a reason TLV block.
    SignOff = 4,
    /// Keep-alive: empty payload, logged only.
    KeepAlive = 5,
}

impl FlapFrameType {
    /// Decode a wire frame-type byte.
    pub fn from_u8(v: u8) -> Result<Self, ProtocolError> {
        match v {
            1 => Ok(Self::SignOn),
            2 => Ok(Self::Data),
            3 => Ok(Self::Error),
            4 => Ok(Self::SignOff),
            5 => Ok(Self::KeepAlive),
            other => Err(ProtocolError::UnknownFrameType(other)),
        }
    }
}

/// The 6-byte FLAP header, in wire (big-endian) byte order.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Clone, Copy)]
#[repr(C)]
pub struct FlapHeader {
    marker: u8,
    frame_type: u8,
    sequence: [u8; 2],
    payload_len: [u8; 2],
}

/// Size in bytes of [`FlapHeader`] on the wire.
pub const FLAP_HEADER_SIZE: usize = 6;

impl FlapHeader {
    /// Build a header. `sequence` and `payload_len` are host-order values;
    /// they are stored big-endian.
    #[must_use]
    pub fn new(frame_type: FlapFrameType, sequence: u16, payload_len: u16) -> Self {
        Self {
            marker: FLAP_MARKER,
            frame_type: frame_type as u8,
            sequence: sequence.to_be_bytes(),
            payload_len: payload_len.to_be_bytes(),
        }
    }

    /// The frame's sequence number.
    #[must_use]
    pub fn sequence(&self) -> u16 {
        u16::from_be_bytes(self.sequence)
    }

    /// The declared payload length.
    #[must_use]
    pub fn payload_len(&self) -> u16 {
        u16::from_be_bytes(self.payload_len)
    }

    /// The frame type, re-parsed from the raw byte.
    pub fn frame_type(&self) -> Result<FlapFrameType, ProtocolError> {
        FlapFrameType::from_u8(self.frame_type)
    }
}

/// A decoded FLAP frame: header plus its exact-length payload.
#[derive(Debug, Clone)]
pub struct FlapFrame {
    /// Frame type.
    pub frame_type: FlapFrameType,
    /// Sequence number this frame was sent (or received) with.
    pub sequence: u16,
    /// Raw payload bytes. For `Data` frames this is a SNAC.
    pub payload: Bytes,
}

impl FlapFrame {
    /// Construct a frame from its parts, deriving `payload_len`.
    #[must_use]
    pub fn new(frame_type: FlapFrameType, sequence: u16, payload: Bytes) -> Self {
        Self { frame_type, sequence, payload }
    }

    /// Encode this frame (header + payload) onto `out`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::OversizePayload`] if the payload cannot fit
    /// in the 16-bit length field or exceeds [`MAX_PAYLOAD_SIZE`].
    pub fn encode(&self, out: &mut BytesMut) -> Result<(), ProtocolError> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::OversizePayload(self.payload.len()));
        }
        let header =
            FlapHeader::new(self.frame_type, self.sequence, self.payload.len() as u16);
        out.put_slice(header.as_bytes());
        out.put_slice(&self.payload);
        Ok(())
    }

    /// Decode a FLAP header from exactly [`FLAP_HEADER_SIZE`] bytes.
    ///
    /// Callers are expected to then read `header.payload_len()` more bytes
    /// and call [`Self::from_parts`]; this split mirrors how a reader task
    /// pulls the header first to learn how many payload bytes to await.
    pub fn decode_header(buf: &[u8]) -> Result<FlapHeader, ProtocolError> {
        if buf.len() < FLAP_HEADER_SIZE {
            return Err(ProtocolError::ShortRead { needed: FLAP_HEADER_SIZE, have: buf.len() });
        }
        let header = FlapHeader::read_from_bytes(&buf[..FLAP_HEADER_SIZE])
            .map_err(|_| ProtocolError::ShortRead { needed: FLAP_HEADER_SIZE, have: buf.len() })?;
        if header.marker != FLAP_MARKER {
            return Err(ProtocolError::BadMarker(header.marker));
        }
        if header.payload_len() as usize > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::OversizePayload(header.payload_len() as usize));
        }
        Ok(header)
    }

    /// Combine a decoded header with its payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ShortRead`] if `payload` is shorter than
    /// `header.payload_len()` declared.
    pub fn from_parts(header: &FlapHeader, payload: Bytes) -> Result<Self, ProtocolError> {
        let declared = header.payload_len() as usize;
        if payload.len() != declared {
            return Err(ProtocolError::ShortRead { needed: declared, have: payload.len() });
        }
        Ok(Self { frame_type: header.frame_type()?, sequence: header.sequence(), payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_data_frame() {
        let frame = FlapFrame::new(FlapFrameType::Data, 7, Bytes::from_static(b"hello"));
        let mut buf = BytesMut::new();
        frame.encode(&mut buf).expect("encode");

        let header = FlapFrame::decode_header(&buf).expect("header");
        assert_eq!(header.sequence(), 7);
        assert_eq!(header.payload_len(), 5);

        let payload = buf.split_off(FLAP_HEADER_SIZE).freeze();
        let decoded = FlapFrame::from_parts(&header, payload).expect("frame");
        assert_eq!(decoded.frame_type, FlapFrameType::Data);
        assert_eq!(&decoded.payload[..], b"hello");
    }

    #[test]
    fn rejects_bad_marker() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x00);
        buf.put_u8(2);
        buf.put_u16(1);
        buf.put_u16(0);
        assert!(matches!(
            FlapFrame::decode_header(&buf),
            Err(ProtocolError::BadMarker(0x00))
        ));
    }

    #[test]
    fn rejects_short_header() {
        let buf = [FLAP_MARKER, 2, 0, 1];
        assert!(matches!(
            FlapFrame::decode_header(&buf),
            Err(ProtocolError::ShortRead { .. })
        ));
    }

    #[test]
    fn rejects_payload_length_mismatch() {
        let header = FlapHeader::new(FlapFrameType::Data, 1, 10);
        let short_payload = Bytes::from_static(b"short");
        assert!(matches!(
            FlapFrame::from_parts(&header, short_payload),
            Err(ProtocolError::ShortRead { .. })
        ));
    }
}
