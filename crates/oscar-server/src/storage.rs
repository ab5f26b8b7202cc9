//! Narrow storage interfaces the core consumes for persisted state.
//!
//! None of this is implemented as a real database here — that's an external
//! collaborator per the design's scope. Each trait is a thin synchronous
//! seam; this module ships only in-memory reference implementations, used
//! by the demo binary and by tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// A single feedbag (server-side buddy list) item: a buddy, group, permit,
/// deny, or icon-ref entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbagItem {
    /// The cluster (group) this item belongs to.
    pub group_id: u16,
    /// Unique id within the owning ident's feedbag.
    pub item_id: u16,
    /// The item's class (buddy=0, group=1, permit=2, deny=3, ...).
    pub class_id: u16,
    /// The item's display name (a buddy's or group's screen name).
    pub name: String,
}

/// Profile text storage (the "away message" / info text a user publishes).
pub trait UserStore: Clone + Send + Sync + 'static {
    /// The ident's current profile text, if set.
    fn profile_text(&self, ident: &str) -> Option<String>;

    /// Replace the ident's profile text.
    fn set_profile_text(&self, ident: &str, text: String);
}

/// Server-side buddy list (feedbag) storage.
pub trait FeedbagStore: Clone + Send + Sync + 'static {
    /// All feedbag items for `ident`, in no particular order.
    fn items(&self, ident: &str) -> Vec<FeedbagItem>;

    /// Replace `ident`'s feedbag wholesale (the wire protocol's feedbag
    /// sync is a full-replace operation in the common case).
    fn set_items(&self, ident: &str, items: Vec<FeedbagItem>);
}

/// BART (buddy icon / asset) blob storage, keyed by content hash.
pub trait BartStore: Clone + Send + Sync + 'static {
    /// The icon bytes for `hash`, if present.
    fn icon(&self, hash: &[u8]) -> Option<Vec<u8>>;

    /// Store an icon under `hash`.
    fn put_icon(&self, hash: Vec<u8>, data: Vec<u8>);
}

/// Online-directory search storage (category/keyword search).
pub trait DirectoryStore: Clone + Send + Sync + 'static {
    /// Idents whose directory listing matches `keyword`.
    fn search(&self, keyword: &str) -> Vec<String>;
}

/// In-memory reference implementation of all four storage traits, backing
/// the demo binary and the test suite.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    profiles: Arc<Mutex<HashMap<String, String>>>,
    feedbags: Arc<Mutex<HashMap<String, Vec<FeedbagItem>>>>,
    icons: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
    directory: Arc<Mutex<HashMap<String, Vec<String>>>>,
}

impl MemoryStorage {
    /// An empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a directory entry for `keyword` -> idents, for tests/demos.
    pub fn seed_directory(&self, keyword: &str, idents: Vec<String>) {
        self.directory
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(keyword.to_string(), idents);
    }
}

impl UserStore for MemoryStorage {
    fn profile_text(&self, ident: &str) -> Option<String> {
        self.profiles.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(ident).cloned()
    }

    fn set_profile_text(&self, ident: &str, text: String) {
        self.profiles
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(ident.to_string(), text);
    }
}

impl FeedbagStore for MemoryStorage {
    fn items(&self, ident: &str) -> Vec<FeedbagItem> {
        self.feedbags
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(ident)
            .cloned()
            .unwrap_or_default()
    }

    fn set_items(&self, ident: &str, items: Vec<FeedbagItem>) {
        self.feedbags
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(ident.to_string(), items);
    }
}

impl BartStore for MemoryStorage {
    fn icon(&self, hash: &[u8]) -> Option<Vec<u8>> {
        self.icons.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(hash).cloned()
    }

    fn put_icon(&self, hash: Vec<u8>, data: Vec<u8>) {
        self.icons.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(hash, data);
    }
}

impl DirectoryStore for MemoryStorage {
    fn search(&self, keyword: &str) -> Vec<String> {
        self.directory
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(keyword)
            .cloned()
            .unwrap_or_default()
    }
}
