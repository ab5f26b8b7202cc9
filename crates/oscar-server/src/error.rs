//! Server error types: `thiserror`-derived leaf errors at the router and
//! dispatcher boundaries, composed into a hand-rolled `ServerError` the way
//! the teacher layers its connection/driver errors into one umbrella type.

use std::fmt;

use thiserror::Error;

/// Errors from SNAC routing.
#[derive(Error, Debug)]
pub enum RouterError {
    /// No handler is registered for this `(foodGroup, subGroup)` pair.
    #[error("no route for food group {food_group:#06x} sub group {sub_group:#06x}")]
    RouteNotFound {
        /// The unrouted food group.
        food_group: u16,
        /// The unrouted sub group.
        sub_group: u16,
    },

    /// The request body failed to deserialize for its matched route.
    #[error("malformed request body: {0}")]
    MalformedBody(#[from] oscar_proto::ProtocolError),
}

/// Errors terminating a connection's dispatch loop.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The inbound frame was malformed (bad marker, short read, oversize
    /// payload). Fatal to the connection.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] oscar_proto::ProtocolError),

    /// A protocol-critical rate class crossed its disconnect threshold.
    #[error("rate limit disconnect for class ({0:?})")]
    RateDisconnect((u16, u16)),

    /// The peer sent a signon frame mid-session, or an error frame.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// The session was evicted by a newer login.
    #[error("session evicted by relogin")]
    SessionEvicted,

    /// The server is shutting down.
    #[error("server shutdown")]
    Shutdown,

    /// The underlying socket returned an I/O error.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the auth and service handshakes.
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// Auth failed (bad credentials, unknown user, rate limited).
    #[error("auth failed: {0}")]
    Auth(#[from] oscar_core::AuthError),

    /// The presented cookie did not crack.
    #[error("invalid cookie: {0}")]
    Cookie(#[from] oscar_core::CookieError),

    /// The cookie named a chat room that no longer exists.
    #[error("chat handshake failed: {0}")]
    Chat(#[from] oscar_core::ChatError),

    /// The handshake did not complete within its deadline.
    #[error("handshake timed out")]
    Timeout,

    /// Wire-level error while parsing the handshake.
    #[error("protocol error during handshake: {0}")]
    Protocol(#[from] oscar_proto::ProtocolError),

    /// The underlying socket returned an I/O error during the handshake.
    #[error("I/O error during handshake: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level server error, covering configuration, listener setup, and
/// per-connection failure kinds.
#[derive(Debug)]
pub enum ServerError {
    /// Invalid bind address, malformed config file, etc. Fatal at startup.
    Config(String),

    /// Listener bind/accept failure.
    Transport(String),

    /// A connection's handshake failed.
    Handshake(HandshakeError),

    /// A connection's dispatch loop terminated with an error.
    Dispatch(DispatchError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Handshake(err) => write!(f, "handshake error: {err}"),
            Self::Dispatch(err) => write!(f, "dispatch error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Handshake(err) => Some(err),
            Self::Dispatch(err) => Some(err),
            Self::Config(_) | Self::Transport(_) => None,
        }
    }
}

impl From<HandshakeError> for ServerError {
    fn from(err: HandshakeError) -> Self {
        Self::Handshake(err)
    }
}

impl From<DispatchError> for ServerError {
    fn from(err: DispatchError) -> Self {
        Self::Dispatch(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
