//! Little-endian primitives for ICQ-metadata payloads.
//!
//! Every other corner of OSCAR is big-endian (see [`crate::snac`] and
//! [`crate::flap`]); ICQ's DBQuery metadata sub-protocol is the sole
//! exception. Keeping the byte order confined to this module is the point —
//! nothing outside it should ever call `from_le_bytes`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Read a little-endian `u16` from the front of `buf`.
///
/// # Errors
///
/// Returns [`ProtocolError::ShortRead`] if fewer than 2 bytes remain.
pub fn get_u16_le(buf: &mut Bytes) -> Result<u16, ProtocolError> {
    if buf.remaining() < 2 {
        return Err(ProtocolError::ShortRead { needed: 2, have: buf.remaining() });
    }
    Ok(buf.get_u16_le())
}

/// Read a little-endian `u32` from the front of `buf`.
///
/// # Errors
///
/// Returns [`ProtocolError::ShortRead`] if fewer than 4 bytes remain.
pub fn get_u32_le(buf: &mut Bytes) -> Result<u32, ProtocolError> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::ShortRead { needed: 4, have: buf.remaining() });
    }
    Ok(buf.get_u32_le())
}

/// Append a little-endian `u16`.
pub fn put_u16_le(out: &mut BytesMut, v: u16) {
    out.put_u16_le(v);
}

/// Append a little-endian `u32`.
pub fn put_u32_le(out: &mut BytesMut, v: u32) {
    out.put_u32_le(v);
}

/// Header of an ICQ DBQuery metadata envelope: a little-endian
/// `{len: u16, request_type: u16, uin: u32, request_subtype: u16}` preamble
/// that precedes the request-specific body.
///
/// `len` famously lies on `SearchByUIN2` in QIP 2005 clients (it under-counts
/// by 2 bytes); [`Self::decode`] patches that case rather than failing the
/// read, per the documented client bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcqMetaHeader {
    /// Declared envelope length (patched for the QIP 2005 bug).
    pub len: u16,
    /// ICQ request type.
    pub request_type: u16,
    /// Numeric UIN the request concerns.
    pub uin: u32,
    /// Request sub-type, the second-level dispatch key.
    pub request_subtype: u16,
}

/// `SearchByUIN2` request subtype, the one QIP 2005 miscounts.
pub const REQUEST_SUBTYPE_SEARCH_BY_UIN2: u16 = 0x0566;

impl IcqMetaHeader {
    /// Decode the envelope header, patching the QIP 2005 `SearchByUIN2`
    /// length bug: QIP declares a length two bytes short of the real body,
    /// so the patch adds 2 back before the caller slices the body out.
    pub fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        let mut len = get_u16_le(buf)?;
        let request_type = get_u16_le(buf)?;
        let uin = get_u32_le(buf)?;
        let request_subtype = get_u16_le(buf)?;
        if request_subtype == REQUEST_SUBTYPE_SEARCH_BY_UIN2 {
            len = len.saturating_add(2);
        }
        Ok(Self { len, request_type, uin, request_subtype })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_le_primitives() {
        let mut buf = BytesMut::new();
        put_u16_le(&mut buf, 0x1234);
        put_u32_le(&mut buf, 0xdead_beef);
        let mut frozen = buf.freeze();
        assert_eq!(get_u16_le(&mut frozen).unwrap(), 0x1234);
        assert_eq!(get_u32_le(&mut frozen).unwrap(), 0xdead_beef);
    }

    #[test]
    fn patches_search_by_uin2_length_bug() {
        let mut buf = BytesMut::new();
        put_u16_le(&mut buf, 10); // understated by 2, per the QIP bug
        put_u16_le(&mut buf, 0x07d0);
        put_u32_le(&mut buf, 123_456);
        put_u16_le(&mut buf, REQUEST_SUBTYPE_SEARCH_BY_UIN2);
        let mut frozen = buf.freeze();
        let header = IcqMetaHeader::decode(&mut frozen).expect("decode");
        assert_eq!(header.len, 12);
    }

    #[test]
    fn leaves_other_subtypes_unpatched() {
        let mut buf = BytesMut::new();
        put_u16_le(&mut buf, 10);
        put_u16_le(&mut buf, 0x07d0);
        put_u32_le(&mut buf, 1);
        put_u16_le(&mut buf, 0x0001);
        let mut frozen = buf.freeze();
        let header = IcqMetaHeader::decode(&mut frozen).expect("decode");
        assert_eq!(header.len, 10);
    }
}
