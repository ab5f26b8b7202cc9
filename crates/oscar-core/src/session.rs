//! Per-user in-memory session state.
//!
//! A [`Session`] is heap-allocated and owned by its [`crate::session_manager::SessionManager`];
//! every other holder (buddy registry, chat rooms, the connection
//! dispatcher) keeps either a clone of the `Arc` (safe to read after close)
//! or, per the design note on cyclic references, just the session's `ident`
//! and re-resolves through the manager.

use std::{net::SocketAddr, sync::Mutex};

use oscar_proto::SnacFrame;
use tokio::sync::{mpsc, watch};

use crate::env::Environment;

/// Outbound queue bound. Fixed per the design (">= 64").
pub const OUTBOUND_QUEUE_CAPACITY: usize = 128;

/// Result of [`Session::relay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The message was enqueued.
    Ok,
    /// The outbound queue is full; the caller should mark the session for
    /// closure.
    QueueFull,
    /// The session is already closed.
    Closed,
}

/// User-info flags carried in presence SNACs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserInfoFlags {
    /// Session belongs to a server administrator.
    pub administrator: bool,
    /// Session is an ICQ client (vs. AIM).
    pub icq: bool,
    /// Session connected over a wireless/mobile client.
    pub wireless: bool,
    /// Session is a bot account.
    pub bot: bool,
}

/// Warn-level decay time constant (seconds). Matches the AIM reference
/// client's expectation of a roughly half-hour half-life.
const WARN_DECAY_TAU_SECS: f64 = 1800.0;

struct SessionState<I> {
    display_name: String,
    warn_level: f64,
    warn_last_update: I,
    idle_since: Option<I>,
    away_message: Option<String>,
    flags: UserInfoFlags,
    caps: Vec<[u8; 16]>,
}

/// A connected user's presence and messaging state.
pub struct Session<E: Environment> {
    /// Casefolded, space-stripped identity key.
    pub ident: String,
    /// Optional ICQ UIN (decimal string form of the ident).
    pub uin: Option<String>,
    /// Remote peer address.
    pub remote_addr: SocketAddr,
    /// When this session signed on.
    pub signon_at: E::Instant,
    /// Whether multiple concurrent sessions are permitted for this ident.
    pub multi_conn: bool,
    outbound_tx: mpsc::Sender<SnacFrame>,
    state: Mutex<SessionState<E::Instant>>,
    closed_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
    env: E,
}

impl<E: Environment> Session<E> {
    /// Create a new session and its outbound receiver half.
    ///
    /// The receiver is handed to the connection dispatcher driving this
    /// session; the `Session` itself is what the session manager stores and
    /// other subsystems relay through.
    pub fn new(
        ident: String,
        display_name: String,
        uin: Option<String>,
        remote_addr: SocketAddr,
        multi_conn: bool,
        env: E,
    ) -> (Self, mpsc::Receiver<SnacFrame>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let (closed_tx, closed_rx) = watch::channel(false);
        let now = env.now();
        let session = Self {
            ident,
            uin,
            remote_addr,
            signon_at: now,
            multi_conn,
            outbound_tx,
            state: Mutex::new(SessionState {
                display_name,
                warn_level: 0.0,
                warn_last_update: now,
                idle_since: None,
                away_message: None,
                flags: UserInfoFlags::default(),
                caps: Vec::new(),
            }),
            closed_tx,
            closed_rx,
            env,
        };
        (session, outbound_rx)
    }

    /// The display screen name (case/space preserving).
    pub fn display_name(&self) -> String {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).display_name.clone()
    }

    /// Enqueue an outbound SNAC. Non-blocking.
    pub fn relay(&self, snac: SnacFrame) -> RelayOutcome {
        if *self.closed_rx.borrow() {
            return RelayOutcome::Closed;
        }
        match self.outbound_tx.try_send(snac) {
            Ok(()) => RelayOutcome::Ok,
            Err(mpsc::error::TrySendError::Full(_)) => RelayOutcome::QueueFull,
            Err(mpsc::error::TrySendError::Closed(_)) => RelayOutcome::Closed,
        }
    }

    /// Idempotently close the session: closes the outbound channel (by
    /// flipping the closed flag, which `relay` checks) and signals anyone
    /// awaiting [`Self::closed`].
    pub fn close(&self) {
        let _ = self.closed_tx.send(true);
    }

    /// Whether the session has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed_rx.borrow()
    }

    /// A future that resolves once the session is closed. The dispatcher
    /// selects on this to learn about relogin eviction.
    pub async fn closed(&self) {
        let mut rx = self.closed_rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }

    /// Current warn level (0-1000), decayed from the last update to `now`.
    ///
    /// `prev * exp(-(now - last) / tau)`, clamped to integer granularity.
    /// The decayed value is written back so repeated reads within the same
    /// instant are cheap and monotone.
    pub fn warn_level(&self) -> u32 {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = self.env.now();
        let elapsed = now.max(state.warn_last_update) - state.warn_last_update;
        let decayed = state.warn_level * (-elapsed.as_secs_f64() / WARN_DECAY_TAU_SECS).exp();
        state.warn_level = decayed;
        state.warn_last_update = now;
        decayed.round().clamp(0.0, 1000.0) as u32
    }

    /// Apply a warning, adding `amount` (0-1000) to the decayed current
    /// level, clamped at 1000.
    pub fn add_warning(&self, amount: u32) {
        let current = self.warn_level();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.warn_level = f64::from(current.saturating_add(amount).min(1000));
    }

    /// Mark the session idle as of `now`, or clear idle if `None`.
    pub fn set_idle(&self, idle_since: Option<E::Instant>) {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).idle_since = idle_since;
    }

    /// Whether the session is currently idle.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).idle_since.is_some()
    }

    /// Set the away message (`None` clears it).
    pub fn set_away_message(&self, message: Option<String>) {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).away_message = message;
    }

    /// The current away message, if any.
    pub fn away_message(&self) -> Option<String> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).away_message.clone()
    }

    /// Replace the user-info flags.
    pub fn set_flags(&self, flags: UserInfoFlags) {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).flags = flags;
    }

    /// The current user-info flags.
    #[must_use]
    pub fn flags(&self) -> UserInfoFlags {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).flags
    }

    /// Replace the advertised capability list.
    pub fn set_caps(&self, caps: Vec<[u8; 16]>) {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).caps = caps;
    }

    /// The advertised capability list.
    #[must_use]
    pub fn caps(&self) -> Vec<[u8; 16]> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).caps.clone()
    }
}
