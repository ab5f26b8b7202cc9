//! TLV (tag-length-value) encoding used inside FLAP signon/signoff bodies and
//! most SNAC bodies.
//!
//! `{tag: u16be, length: u16be, value: [u8; length]}`. Repeated tags are
//! legal and ordering is preserved on the wire, so a [`TlvBlock`] is a `Vec`
//! rather than a map.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// A single tag-length-value entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    /// The TLV tag.
    pub tag: u16,
    /// The raw value bytes.
    pub value: Bytes,
}

impl Tlv {
    /// Build a TLV from raw bytes.
    pub fn new(tag: u16, value: impl Into<Bytes>) -> Self {
        Self { tag, value: value.into() }
    }

    /// Build a TLV carrying a big-endian `u8`.
    #[must_use]
    pub fn u8(tag: u16, v: u8) -> Self {
        Self::new(tag, Bytes::copy_from_slice(&[v]))
    }

    /// Build a TLV carrying a big-endian `u16`.
    #[must_use]
    pub fn u16(tag: u16, v: u16) -> Self {
        Self::new(tag, Bytes::copy_from_slice(&v.to_be_bytes()))
    }

    /// Build a TLV carrying a big-endian `u32`.
    #[must_use]
    pub fn u32(tag: u16, v: u32) -> Self {
        Self::new(tag, Bytes::copy_from_slice(&v.to_be_bytes()))
    }

    /// Build a TLV carrying a UTF-8 string, verbatim (no null terminator).
    #[must_use]
    pub fn string(tag: u16, v: &str) -> Self {
        Self::new(tag, Bytes::copy_from_slice(v.as_bytes()))
    }

    /// Build a zero-length marker TLV (presence-only, e.g. "is ICQ").
    #[must_use]
    pub fn flag(tag: u16) -> Self {
        Self::new(tag, Bytes::new())
    }

    /// Interpret the value as a big-endian `u8`.
    #[must_use]
    pub fn as_u8(&self) -> Option<u8> {
        self.value.first().copied()
    }

    /// Interpret the value as a big-endian `u16`.
    #[must_use]
    pub fn as_u16(&self) -> Option<u16> {
        (self.value.len() >= 2).then(|| u16::from_be_bytes([self.value[0], self.value[1]]))
    }

    /// Interpret the value as a big-endian `u32`.
    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        (self.value.len() >= 4).then(|| {
            u32::from_be_bytes([self.value[0], self.value[1], self.value[2], self.value[3]])
        })
    }

    /// Interpret the value as a UTF-8 string, lossily.
    #[must_use]
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_u16(self.tag);
        out.put_u16(self.value.len() as u16);
        out.put_slice(&self.value);
    }
}

/// An ordered sequence of TLVs, as found in FLAP signon bodies and most SNAC
/// payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlvBlock(pub Vec<Tlv>);

impl TlvBlock {
    /// An empty block.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a TLV, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, tlv: Tlv) -> Self {
        self.0.push(tlv);
        self
    }

    /// Push a TLV in place.
    pub fn push(&mut self, tlv: Tlv) {
        self.0.push(tlv);
    }

    /// First TLV matching `tag`, if any. Repeated tags keep earlier entries
    /// first, matching wire order.
    #[must_use]
    pub fn get(&self, tag: u16) -> Option<&Tlv> {
        self.0.iter().find(|t| t.tag == tag)
    }

    /// All TLVs matching `tag`, in wire order.
    pub fn get_all(&self, tag: u16) -> impl Iterator<Item = &Tlv> {
        self.0.iter().filter(move |t| t.tag == tag)
    }

    /// Encode every TLV in order onto `out`.
    pub fn encode(&self, out: &mut BytesMut) {
        for tlv in &self.0 {
            tlv.encode(out);
        }
    }

    /// Decode TLVs until `buf` is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedTlv`] if a declared length runs past
    /// the end of `buf`.
    pub fn decode(mut buf: Bytes) -> Result<Self, ProtocolError> {
        let mut tlvs = Vec::new();
        while buf.remaining() > 0 {
            if buf.remaining() < 4 {
                return Err(ProtocolError::TruncatedTlv {
                    tag: 0,
                    declared: 4,
                    remaining: buf.remaining(),
                });
            }
            let tag = buf.get_u16();
            let len = buf.get_u16() as usize;
            if buf.remaining() < len {
                return Err(ProtocolError::TruncatedTlv { tag, declared: len, remaining: buf.remaining() });
            }
            let value = buf.copy_to_bytes(len);
            tlvs.push(Tlv { tag, value });
        }
        Ok(Self(tlvs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_block() {
        let block = TlvBlock::new()
            .with(Tlv::string(0x0001, "alice"))
            .with(Tlv::u32(0x0006, 0xdead_beef))
            .with(Tlv::flag(0x004a));

        let mut buf = BytesMut::new();
        block.encode(&mut buf);

        let decoded = TlvBlock::decode(buf.freeze()).expect("decode");
        assert_eq!(decoded, block);
        assert_eq!(decoded.get(0x0001).unwrap().as_str_lossy(), "alice");
        assert_eq!(decoded.get(0x0006).unwrap().as_u32(), Some(0xdead_beef));
        assert_eq!(decoded.get(0x004a).unwrap().value.len(), 0);
    }

    #[test]
    fn preserves_repeated_tags_in_order() {
        let block = TlvBlock::new().with(Tlv::u8(1, 1)).with(Tlv::u8(1, 2));
        let all: Vec<u8> = block.get_all(1).filter_map(Tlv::as_u8).collect();
        assert_eq!(all, vec![1, 2]);
    }

    #[test]
    fn rejects_truncated_value() {
        let mut buf = BytesMut::new();
        buf.put_u16(1);
        buf.put_u16(10);
        buf.put_slice(b"short");
        assert!(matches!(
            TlvBlock::decode(buf.freeze()),
            Err(ProtocolError::TruncatedTlv { .. })
        ));
    }

    proptest::proptest! {
        #[test]
        fn arbitrary_single_tlv_round_trips(tag: u16, value: Vec<u8>) {
            let block = TlvBlock::new().with(Tlv::new(tag, Bytes::from(value)));
            let mut buf = BytesMut::new();
            block.encode(&mut buf);
            let decoded = TlvBlock::decode(buf.freeze()).unwrap();
            prop_assert_eq!(decoded, block);
        }
    }
}
