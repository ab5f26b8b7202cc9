//! OSCAR (AIM/ICQ) instant-messaging protocol server.
//!
//! Production server implementation using plain TCP for transport, Tokio for
//! async runtime, and system time with cryptographic RNG. Session, presence,
//! and protocol-state logic lives in `oscar-core` and is driven here by
//! [`system_env::SystemEnv`]; wire framing lives in `oscar-proto`.
//!
//! # Components
//!
//! - [`config::ServerConfig`]: TOML-loadable runtime configuration
//! - [`router::Router`]: the static SNAC dispatch table
//! - [`dispatcher::run_connection`]: the per-connection `select!` loop
//! - [`shells`]: the auth and post-auth handshakes each listener runs
//! - [`storage::MemoryStorage`]: in-memory reference storage backend
//! - [`system_env::SystemEnv`]: production environment (real time, crypto RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod listener;
pub mod router;
pub mod shells;
pub mod storage;
pub mod system_env;

pub use config::ServerConfig;
pub use error::ServerError;
pub use listener::run_server;
pub use system_env::SystemEnv;
