//! Session, presence, and protocol-state primitives for an OSCAR server.
//!
//! This crate is transport-agnostic: it knows nothing about sockets. It
//! owns the parts of the server that benefit from being driven by a
//! simulated [`env::Environment`] in tests — session bookkeeping, server
//! cookies, rate limiting, auth outcomes, and the chat and buddy fabrics.
//! Wire framing lives in `oscar-proto`; socket I/O and the per-connection
//! dispatcher live in `oscar-server`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod buddy;
pub mod chat;
pub mod cookie;
pub mod env;
pub mod error;
pub mod flap_client;
pub mod rate_limit;
pub mod session;
pub mod session_manager;

/// Deterministic [`Environment`] for tests, exposed to other workspace
/// crates' test suites via the `test-util` feature (this crate's own tests
/// always have it, via `cfg(test)`).
#[cfg(any(test, feature = "test-util"))]
pub mod testutil;

pub use cookie::{CookieBaker, ServerCookie, ServiceId};
pub use env::Environment;
pub use error::{AuthError, ChatError, CookieError, SessionError};
pub use session::{RelayOutcome, Session, UserInfoFlags};
pub use session_manager::SessionManager;
