//! Wire-level errors.

/// Errors raised while decoding or encoding OSCAR wire structures.
///
/// These map directly onto the "fatal to connection" error kinds named in the
/// error handling design: a `ProtocolError` anywhere in a read path means the
/// connection cannot continue.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Buffer ended before a fixed-size header could be read.
    #[error("short read: need {needed} bytes, have {have}")]
    ShortRead {
        /// Bytes required to complete the read.
        needed: usize,
        /// Bytes actually available.
        have: usize,
    },

    /// The FLAP start marker was not `0x2A`.
    #[error("bad FLAP marker: {0:#04x}")]
    BadMarker(u8),

    /// An unrecognized FLAP frame type byte.
    #[error("unknown FLAP frame type: {0}")]
    UnknownFrameType(u8),

    /// Declared payload length exceeds the protocol's hard cap.
    #[error("oversize payload: {0} bytes")]
    OversizePayload(usize),

    /// A TLV's declared length ran past the end of its containing buffer.
    #[error("truncated TLV: tag {tag:#06x} declares {declared} bytes, {remaining} remain")]
    TruncatedTlv {
        /// TLV tag under decode.
        tag: u16,
        /// Length the TLV header declared.
        declared: usize,
        /// Bytes actually remaining in the buffer.
        remaining: usize,
    },

    /// A SNAC body was shorter than its fixed header.
    #[error("truncated SNAC header")]
    TruncatedSnacHeader,
}
