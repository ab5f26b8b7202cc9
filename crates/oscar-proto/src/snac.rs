//! SNAC (Service-Network Atomic Command): the typed message carried inside a
//! FLAP `Data` frame.
//!
//! Wire layout: `{foodGroup: u16be, subGroup: u16be, flags: u16be,
//! requestId: u32be, body: [u8]}`. The body is itself usually a [`TlvBlock`],
//! but food groups are free to define fixed-layout bodies; this crate only
//! owns the 10-byte header.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Size in bytes of the fixed SNAC header.
pub const SNAC_HEADER_SIZE: usize = 10;

/// The fixed 10-byte SNAC header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnacHeader {
    /// Food group (namespace) this SNAC belongs to.
    pub food_group: u16,
    /// Sub-group (operation) within the food group.
    pub sub_group: u16,
    /// Protocol flags; largely unused by the core, passed through verbatim.
    pub flags: u16,
    /// Request id, echoed back in responses so clients can correlate them.
    pub request_id: u32,
}

impl SnacHeader {
    /// Build a header for a reply carrying the same `request_id` as `self`.
    #[must_use]
    pub fn reply_to(&self, food_group: u16, sub_group: u16) -> Self {
        Self { food_group, sub_group, flags: 0, request_id: self.request_id }
    }

    /// The `(foodGroup, subGroup)` pair used as the router's dispatch key.
    #[must_use]
    pub fn route_key(&self) -> (u16, u16) {
        (self.food_group, self.sub_group)
    }
}

/// A full SNAC: header plus body bytes.
#[derive(Debug, Clone)]
pub struct SnacFrame {
    /// The fixed header.
    pub header: SnacHeader,
    /// Body bytes, interpreted by the food-group service the header routes
    /// to (typically a [`crate::tlv::TlvBlock`]).
    pub body: Bytes,
}

impl SnacFrame {
    /// Build a SNAC frame.
    #[must_use]
    pub fn new(header: SnacHeader, body: impl Into<Bytes>) -> Self {
        Self { header, body: body.into() }
    }

    /// Encode header + body onto `out`.
    pub fn encode(&self, out: &mut BytesMut) {
        out.put_u16(self.header.food_group);
        out.put_u16(self.header.sub_group);
        out.put_u16(self.header.flags);
        out.put_u32(self.header.request_id);
        out.put_slice(&self.body);
    }

    /// Decode a SNAC frame from a full FLAP `Data` payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedSnacHeader`] if `buf` is shorter
    /// than [`SNAC_HEADER_SIZE`].
    pub fn decode(mut buf: Bytes) -> Result<Self, ProtocolError> {
        if buf.remaining() < SNAC_HEADER_SIZE {
            return Err(ProtocolError::TruncatedSnacHeader);
        }
        let header = SnacHeader {
            food_group: buf.get_u16(),
            sub_group: buf.get_u16(),
            flags: buf.get_u16(),
            request_id: buf.get_u32(),
        };
        Ok(Self { header, body: buf })
    }
}
