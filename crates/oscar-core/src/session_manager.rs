//! Registry of live sessions keyed by ident screen name.
//!
//! The manager is the sole owner of every [`Session`]; every other holder
//! (buddy registry, chat rooms) keeps only the ident string and looks the
//! session back up here, per the cyclic-reference resolution in the design
//! notes.

use std::{collections::HashMap, sync::Arc, sync::RwLock};

use oscar_proto::SnacFrame;

use crate::{
    env::Environment,
    session::{RelayOutcome, Session},
};

/// Live-session registry for one service (BOS, or one chat room).
pub struct SessionManager<E: Environment> {
    sessions: RwLock<HashMap<String, Arc<Session<E>>>>,
}

impl<E: Environment> SessionManager<E> {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { sessions: RwLock::new(HashMap::new()) }
    }

    /// Register `session`, evicting and closing any prior session for the
    /// same ident unless the new session allows multi-conn. Returns the
    /// evicted session, if any, so the caller can log and signoff it.
    pub fn add_session(&self, session: Arc<Session<E>>) -> Option<Arc<Session<E>>> {
        let mut sessions = self.sessions.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let evicted = if session.multi_conn { None } else { sessions.remove(&session.ident) };
        if let Some(old) = &evicted {
            old.close();
        }
        sessions.insert(session.ident.clone(), session);
        evicted
    }

    /// Look up a session by ident.
    #[must_use]
    pub fn retrieve_by_ident(&self, ident: &str) -> Option<Arc<Session<E>>> {
        self.sessions.read().unwrap_or_else(std::sync::PoisonError::into_inner).get(ident).cloned()
    }

    /// Remove `ident`'s entry, but only if it still points at `session` —
    /// guards against a stale dispatcher removing the entry a newer login
    /// just installed.
    pub fn remove_if_current(&self, ident: &str, session: &Arc<Session<E>>) {
        let mut sessions = self.sessions.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(current) = sessions.get(ident) {
            if Arc::ptr_eq(current, session) {
                sessions.remove(ident);
            }
        }
    }

    /// A snapshot of all live sessions, for the admin API.
    #[must_use]
    pub fn all_sessions(&self) -> Vec<Arc<Session<E>>> {
        self.sessions.read().unwrap_or_else(std::sync::PoisonError::into_inner).values().cloned().collect()
    }

    /// Directed delivery. No error if `ident` is absent; returns `None` in
    /// that case, or the relay outcome if present.
    pub fn relay_to_ident(&self, ident: &str, snac: SnacFrame) -> Option<RelayOutcome> {
        self.retrieve_by_ident(ident).map(|session| session.relay(snac))
    }

    /// Directed delivery to every ident in `idents`, cloning `snac` for each
    /// recipient (used for buddy arrival/departure fan-out).
    pub fn relay_to_idents(&self, idents: &[String], snac: &SnacFrame) {
        for ident in idents {
            self.relay_to_ident(ident, snac.clone());
        }
    }

    /// Deliver `snac` to every session for which `pred(ident)` holds, used
    /// by chat rooms to fan a message out to participants.
    pub fn broadcast(&self, snac: &SnacFrame, mut pred: impl FnMut(&str) -> bool) {
        let sessions = self.sessions.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        for (ident, session) in sessions.iter() {
            if pred(ident) {
                session.relay(snac.clone());
            }
        }
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// Whether the registry holds no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: Environment> Default for SessionManager<E> {
    fn default() -> Self {
        Self::new()
    }
}
