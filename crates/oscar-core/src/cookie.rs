//! Cookie baker: HMAC-signed, time-stamped opaque blobs binding an
//! authenticated identity to the service it's allowed to connect to next.
//!
//! Wire layout: `version(1) | issuedUnix(8) | service(2) | identLen(1) |
//! identBytes | extraLen(2) | extraBytes | nonce(16) | HMAC-SHA256(16)`.
//! The serialized form is opaque to clients; only the issuer interprets it.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{env::Environment, error::CookieError};

/// Cookie format version.
const COOKIE_VERSION: u8 = 1;
/// Truncated MAC length carried on the wire (full HMAC-SHA256 is 32 bytes).
const MAC_LEN: usize = 16;
/// Nonce length.
const NONCE_LEN: usize = 16;
/// Default cookie TTL: 5 minutes.
pub const DEFAULT_TTL_SECS: u64 = 5 * 60;

/// Which OSCAR service a cookie authorizes a connection to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceId {
    /// Basic OSCAR Service: presence + messaging.
    Bos,
    /// A chat room connection (room identified by the cookie's `extra`).
    Chat,
    /// Chat-nav: room directory/creation.
    ChatNav,
    /// Admin: shares the BOS session.
    Admin,
    /// BART: buddy icon / asset transfer.
    Bart,
    /// Alert notifications.
    Alert,
}

impl ServiceId {
    fn to_wire(self) -> u16 {
        match self {
            Self::Bos => 1,
            Self::Chat => 2,
            Self::ChatNav => 3,
            Self::Admin => 4,
            Self::Bart => 5,
            Self::Alert => 6,
        }
    }

    fn from_wire(v: u16) -> Result<Self, CookieError> {
        match v {
            1 => Ok(Self::Bos),
            2 => Ok(Self::Chat),
            3 => Ok(Self::ChatNav),
            4 => Ok(Self::Admin),
            5 => Ok(Self::Bart),
            6 => Ok(Self::Alert),
            _ => Err(CookieError::Malformed),
        }
    }
}

/// The fields carried by a server cookie, after a successful crack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCookie {
    /// Service this cookie authorizes.
    pub service: ServiceId,
    /// The authenticated ident screen name.
    pub ident: String,
    /// Service-specific extra payload (e.g. the chat room cookie).
    pub extra: Vec<u8>,
    /// Unix timestamp the cookie was issued at.
    pub issued_secs: u64,
}

/// Issues and verifies server cookies with an HMAC-SHA256 server secret.
pub struct CookieBaker<E> {
    secret: Vec<u8>,
    ttl_secs: u64,
    env: E,
}

impl<E: Environment> CookieBaker<E> {
    /// Build a baker with the default TTL ([`DEFAULT_TTL_SECS`]).
    pub fn new(secret: Vec<u8>, env: E) -> Self {
        Self { secret, ttl_secs: DEFAULT_TTL_SECS, env }
    }

    /// Build a baker with an explicit TTL override.
    pub fn with_ttl(secret: Vec<u8>, ttl_secs: u64, env: E) -> Self {
        Self { secret, ttl_secs, env }
    }

    fn mac_over(&self, fields: &[u8]) -> [u8; MAC_LEN] {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(fields);
        let full = mac.finalize().into_bytes();
        let mut out = [0u8; MAC_LEN];
        out.copy_from_slice(&full[..MAC_LEN]);
        out
    }

    /// Issue a cookie binding `service`, `ident`, and an opaque `extra`
    /// payload at the current wall-clock time.
    pub fn issue(&self, service: ServiceId, ident: &str, extra: &[u8]) -> Vec<u8> {
        let issued = self.env.wall_clock_secs();
        let nonce = self.env.random_bytes16();

        let mut fields = Vec::with_capacity(64 + ident.len() + extra.len());
        fields.push(COOKIE_VERSION);
        fields.extend_from_slice(&issued.to_be_bytes());
        fields.extend_from_slice(&service.to_wire().to_be_bytes());
        fields.push(ident.len().min(u8::MAX as usize) as u8);
        fields.extend_from_slice(ident.as_bytes());
        fields.extend_from_slice(&(extra.len() as u16).to_be_bytes());
        fields.extend_from_slice(extra);
        fields.extend_from_slice(&nonce);

        let mac = self.mac_over(&fields);
        fields.extend_from_slice(&mac);
        fields
    }

    /// Crack a cookie, requiring it to have been issued for `expected_service`
    /// and to still be within its TTL.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError::Malformed`] if the encoding is truncated,
    /// [`CookieError::BadSignature`] if the MAC does not match,
    /// [`CookieError::WrongService`] if the service doesn't match, or
    /// [`CookieError::Expired`] if the TTL has elapsed.
    pub fn crack(
        &self,
        cookie: &[u8],
        expected_service: ServiceId,
    ) -> Result<ServerCookie, CookieError> {
        if cookie.len() < 1 + 8 + 2 + 1 + 2 + NONCE_LEN + MAC_LEN {
            return Err(CookieError::Malformed);
        }
        let signed_len = cookie.len() - MAC_LEN;
        let (fields, mac_bytes) = cookie.split_at(signed_len);

        let expected_mac = self.mac_over(fields);
        if !ct_eq(&expected_mac, mac_bytes) {
            return Err(CookieError::BadSignature);
        }

        let mut cursor = fields;
        let _version = take_u8(&mut cursor)?;
        let issued_secs = take_u64(&mut cursor)?;
        let service = ServiceId::from_wire(take_u16(&mut cursor)?)?;
        let ident_len = usize::from(take_u8(&mut cursor)?);
        let ident = take_bytes(&mut cursor, ident_len)?;
        let ident = String::from_utf8(ident).map_err(|_| CookieError::Malformed)?;
        let extra_len = usize::from(take_u16(&mut cursor)?);
        let extra = take_bytes(&mut cursor, extra_len)?;

        if service != expected_service {
            return Err(CookieError::WrongService { issued: service, presented: expected_service });
        }

        let now = self.env.wall_clock_secs();
        if now.saturating_sub(issued_secs) > self.ttl_secs {
            return Err(CookieError::Expired { issued_secs, now_secs: now, ttl_secs: self.ttl_secs });
        }

        Ok(ServerCookie { service, ident, extra, issued_secs })
    }
}

/// Constant-time byte-slice equality. Returns `false` immediately on length
/// mismatch (lengths are public here, not secret), but never short-circuits
/// on content once lengths match.
fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn take_u8(buf: &mut &[u8]) -> Result<u8, CookieError> {
    let (head, tail) = buf.split_first().ok_or(CookieError::Malformed)?;
    *buf = tail;
    Ok(*head)
}

fn take_u16(buf: &mut &[u8]) -> Result<u16, CookieError> {
    let bytes = take_bytes(buf, 2)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn take_u64(buf: &mut &[u8]) -> Result<u64, CookieError> {
    let bytes = take_bytes(buf, 8)?;
    let arr: [u8; 8] = bytes.try_into().map_err(|_| CookieError::Malformed)?;
    Ok(u64::from_be_bytes(arr))
}

fn take_bytes(buf: &mut &[u8], n: usize) -> Result<Vec<u8>, CookieError> {
    if buf.len() < n {
        return Err(CookieError::Malformed);
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head.to_vec())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testutil::TestEnv;

    #[test]
    fn crack_recovers_issued_fields() {
        let env = TestEnv::new();
        let baker = CookieBaker::new(b"server-secret".to_vec(), env);

        let cookie = baker.issue(ServiceId::Bos, "alice", b"");
        let cracked = baker.crack(&cookie, ServiceId::Bos).expect("crack");

        assert_eq!(cracked.ident, "alice");
        assert_eq!(cracked.service, ServiceId::Bos);
        assert!(cracked.extra.is_empty());
    }

    #[test]
    fn crack_recovers_extra_payload() {
        let env = TestEnv::new();
        let baker = CookieBaker::new(b"secret".to_vec(), env);
        let room_cookie = [1u8, 2, 3, 4];

        let cookie = baker.issue(ServiceId::Chat, "bob", &room_cookie);
        let cracked = baker.crack(&cookie, ServiceId::Chat).expect("crack");
        assert_eq!(cracked.extra, room_cookie);
    }

    #[test]
    fn rejects_wrong_service() {
        let env = TestEnv::new();
        let baker = CookieBaker::new(b"secret".to_vec(), env);
        let cookie = baker.issue(ServiceId::Bos, "alice", b"");
        assert!(matches!(
            baker.crack(&cookie, ServiceId::Chat),
            Err(CookieError::WrongService { .. })
        ));
    }

    #[test]
    fn rejects_tampered_signature() {
        let env = TestEnv::new();
        let baker = CookieBaker::new(b"secret".to_vec(), env);
        let mut cookie = baker.issue(ServiceId::Bos, "alice", b"");
        let last = cookie.len() - 1;
        cookie[last] ^= 0xff;
        assert!(matches!(baker.crack(&cookie, ServiceId::Bos), Err(CookieError::BadSignature)));
    }

    #[test]
    fn rejects_expired_cookie() {
        let env = TestEnv::new();
        let baker = CookieBaker::new(b"secret".to_vec(), env.clone());
        let cookie = baker.issue(ServiceId::Bos, "alice", b"");

        env.advance(Duration::from_secs(DEFAULT_TTL_SECS + 1));
        assert!(matches!(baker.crack(&cookie, ServiceId::Bos), Err(CookieError::Expired { .. })));
    }

    #[test]
    fn accepts_within_ttl() {
        let env = TestEnv::new();
        let baker = CookieBaker::new(b"secret".to_vec(), env.clone());
        let cookie = baker.issue(ServiceId::Bos, "alice", b"");

        env.advance(Duration::from_secs(DEFAULT_TTL_SECS - 1));
        assert!(baker.crack(&cookie, ServiceId::Bos).is_ok());
    }

    proptest::proptest! {
        #[test]
        fn issue_then_crack_round_trips(ident in "[a-z]{1,16}", extra: Vec<u8>) {
            let env = TestEnv::new();
            let baker = CookieBaker::new(b"secret".to_vec(), env);
            let cookie = baker.issue(ServiceId::Bart, &ident, &extra);
            let cracked = baker.crack(&cookie, ServiceId::Bart).unwrap();
            prop_assert_eq!(cracked.ident, ident);
            prop_assert_eq!(cracked.extra, extra);
        }
    }
}
