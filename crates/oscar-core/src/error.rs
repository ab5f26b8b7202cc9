//! Error types for the OSCAR protocol core.
//!
//! Each module boundary gets its own `thiserror`-derived leaf error; the
//! dispatcher (in `oscar-server`) composes these into the kinds named in the
//! error handling design (`MalformedFrame`, `RouteNotFound`, `RateLimited`,
//! `AuthFailure`, `SessionEvicted`, `Shutdown`, `StorageError`,
//! `InvalidCookie`, `OversizeFrame`).

use thiserror::Error;

/// Errors from session-level operations (relay, close).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session's outbound queue is full; the caller should close it.
    #[error("outbound queue full for session")]
    QueueFull,

    /// The session has already been closed.
    #[error("session is closed")]
    Closed,
}

/// Errors from cookie issuance and verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CookieError {
    /// The cookie's signature did not match.
    #[error("cookie signature mismatch")]
    BadSignature,

    /// The cookie's encoded form was too short or malformed.
    #[error("malformed cookie")]
    Malformed,

    /// The cookie was accepted past its TTL.
    #[error("cookie expired: issued {issued_secs}, checked {now_secs}, ttl {ttl_secs}")]
    Expired {
        /// Unix timestamp the cookie was issued at.
        issued_secs: u64,
        /// Unix timestamp of the check.
        now_secs: u64,
        /// The TTL, in seconds, that was exceeded.
        ttl_secs: u64,
    },

    /// The cookie was issued for a different service than the one checking
    /// it.
    #[error("cookie service mismatch: issued for {issued:?}, presented to {presented:?}")]
    WrongService {
        /// Service the cookie was issued for.
        issued: crate::cookie::ServiceId,
        /// Service that attempted to crack it.
        presented: crate::cookie::ServiceId,
    },
}

/// Errors from the auth state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The screen name is not known and no stub-user hook is configured.
    #[error("unknown screen name: {0}")]
    UnknownUser(String),

    /// The supplied password (or BUCP hash) did not match.
    #[error("invalid credentials for {0}")]
    InvalidCredentials(String),

    /// Per-IP login rate limit exceeded.
    #[error("login rate limit exceeded for {0}")]
    RateLimited(std::net::IpAddr),

    /// The auth exchange did not complete within the deadline.
    #[error("auth deadline exceeded")]
    Timeout,

    /// A wire-level error occurred while parsing an auth frame.
    #[error("protocol error during auth: {0}")]
    Protocol(#[from] oscar_proto::ProtocolError),

    /// A cookie-related error occurred while issuing the hand-off cookie.
    #[error("cookie error during auth: {0}")]
    Cookie(#[from] CookieError),
}

/// Errors from chat-room fabric operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// No room exists for the given cookie.
    #[error("chat room not found")]
    RoomNotFound,

    /// A room with this cookie already exists.
    #[error("chat room already exists")]
    RoomAlreadyExists,
}
