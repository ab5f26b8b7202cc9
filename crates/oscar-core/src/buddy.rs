//! Buddy-list registry: the watcher → watched adjacency used to fan out
//! arrival/departure notifications.
//!
//! This is distinct from the feedbag (the persisted, versioned buddy list
//! itself, an external storage concern) — this registry only tracks, for
//! the sessions currently online, who should be told when `ident` changes
//! presence. An entry exists iff the session is registered for BOS; it is
//! wiped at server start (it lives only in memory).

use std::{collections::HashMap, sync::RwLock};

/// In-memory watcher adjacency index.
///
/// Keyed by the *watched* ident, mapping to the set of idents who have that
/// person on their buddy list and are therefore owed arrival/departure
/// notifications.
#[derive(Default)]
pub struct BuddyRegistry {
    watchers_of: RwLock<HashMap<String, Vec<String>>>,
}

impl BuddyRegistry {
    /// A fresh, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ident`'s buddy list (the idents it watches) on BOS signon.
    /// Replaces any prior registration for `ident`.
    pub fn register(&self, ident: &str, watches: &[String]) {
        let mut watchers_of = self.watchers_of.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        for entries in watchers_of.values_mut() {
            entries.retain(|w| w != ident);
        }
        for watched in watches {
            watchers_of.entry(watched.clone()).or_default().push(ident.to_string());
        }
    }

    /// Remove `ident` as a watcher of anyone, on BOS signoff. Idents still
    /// watching `ident` are untouched — they remain owed a departure event
    /// for it, which the caller sends before calling this.
    pub fn unregister(&self, ident: &str) {
        let mut watchers_of = self.watchers_of.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        for entries in watchers_of.values_mut() {
            entries.retain(|w| w != ident);
        }
    }

    /// Idents who should be notified of a presence change for `ident`.
    #[must_use]
    pub fn watchers_of(&self, ident: &str) -> Vec<String> {
        self.watchers_of
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(ident)
            .cloned()
            .unwrap_or_default()
    }
}
