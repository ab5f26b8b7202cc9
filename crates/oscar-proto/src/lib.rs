//! Wire codec for the OSCAR instant-messaging protocol.
//!
//! This crate owns only the bytes-in, bytes-out layer: FLAP framing
//! ([`flap`]), TLV encoding ([`tlv`]), the SNAC header ([`snac`]), the
//! ICQ little-endian metadata sub-codec ([`icq`]), and the fixed food-group
//! / TLV-tag constants period clients require ([`foodgroup`]). It has no
//! notion of sessions, auth, or routing — those live in `oscar-core` and
//! `oscar-server`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod flap;
pub mod foodgroup;
pub mod icq;
pub mod snac;
pub mod tlv;

pub use error::ProtocolError;
pub use flap::{FlapFrame, FlapFrameType, FlapHeader, FLAP_HEADER_SIZE, FLAP_MARKER, MAX_PAYLOAD_SIZE};
pub use snac::{SnacFrame, SnacHeader, SNAC_HEADER_SIZE};
pub use tlv::{Tlv, TlvBlock};
