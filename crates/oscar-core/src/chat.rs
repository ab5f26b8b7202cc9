//! Chat-room fabric: room creation, membership, and empty-room collection.
//!
//! A room's participant set is exactly the members of its own
//! [`SessionManager`] — broadcasting a chat message, or joining/leaving, is
//! just delegating to that manager. Message-body construction (the actual
//! `ChatUsersJoined`/`ChannelMsgToClient` SNACs) is the router's job; this
//! module only owns room lifecycle and membership.

use std::{collections::HashMap, sync::Arc, sync::RwLock};

use crate::{
    env::Environment,
    error::ChatError,
    session::Session,
    session_manager::SessionManager,
};

/// Which exchange a room belongs to, per the fixed wire values clients
/// expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeId {
    /// The public chat exchange.
    Public,
    /// A privately created room.
    Private,
}

impl ExchangeId {
    /// The wire value for this exchange.
    #[must_use]
    pub fn to_wire(self) -> u16 {
        match self {
            Self::Public => 5,
            Self::Private => 4,
        }
    }
}

/// A single chat room.
pub struct ChatRoom<E: Environment> {
    /// Opaque 16-byte room identity, used as the room's cookie `extra`.
    pub cookie: [u8; 16],
    /// Room display name.
    pub name: String,
    /// Ident of the session that created the room.
    pub creator_ident: String,
    /// Which exchange the room was created under.
    pub exchange: ExchangeId,
    /// When the room was created.
    pub create_time: E::Instant,
    /// The room's own session manager; its members are the participants.
    /// `Arc`-wrapped so a service shell's [`crate::session_manager::SessionManager`]-
    /// typed router context can hold a cloned handle onto it directly.
    pub sessions: Arc<SessionManager<E>>,
}

/// Registry of live chat rooms, keyed by room cookie.
pub struct ChatRegistry<E: Environment> {
    rooms: RwLock<HashMap<[u8; 16], Arc<ChatRoom<E>>>>,
}

impl<E: Environment> ChatRegistry<E> {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { rooms: RwLock::new(HashMap::new()) }
    }

    /// Create a room, generating a fresh cookie from `env`.
    pub fn create_room(
        &self,
        name: String,
        creator_ident: String,
        exchange: ExchangeId,
        env: &E,
    ) -> Arc<ChatRoom<E>> {
        let cookie = env.random_bytes16();
        let room = Arc::new(ChatRoom {
            cookie,
            name,
            creator_ident,
            exchange,
            create_time: env.now(),
            sessions: Arc::new(SessionManager::new()),
        });
        self.rooms.write().unwrap_or_else(std::sync::PoisonError::into_inner).insert(cookie, room.clone());
        room
    }

    /// Look up a room by cookie.
    #[must_use]
    pub fn get(&self, cookie: &[u8; 16]) -> Option<Arc<ChatRoom<E>>> {
        self.rooms.read().unwrap_or_else(std::sync::PoisonError::into_inner).get(cookie).cloned()
    }

    /// Join `session` into the room identified by `cookie`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::RoomNotFound`] if no such room exists.
    pub fn join(&self, cookie: &[u8; 16], session: Arc<Session<E>>) -> Result<Arc<ChatRoom<E>>, ChatError> {
        let room = self.get(cookie).ok_or(ChatError::RoomNotFound)?;
        room.sessions.add_session(session);
        Ok(room)
    }

    /// Remove `ident` from the room identified by `cookie`; if the room is
    /// left empty, it is collected.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::RoomNotFound`] if no such room exists.
    pub fn leave(&self, cookie: &[u8; 16], ident: &str) -> Result<(), ChatError> {
        let room = self.get(cookie).ok_or(ChatError::RoomNotFound)?;
        if let Some(session) = room.sessions.retrieve_by_ident(ident) {
            room.sessions.remove_if_current(ident, &session);
        }
        if room.sessions.is_empty() {
            self.rooms.write().unwrap_or_else(std::sync::PoisonError::into_inner).remove(cookie);
        }
        Ok(())
    }

    /// Number of live rooms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.read().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// Whether the registry holds no rooms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: Environment> Default for ChatRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, sync::Arc};

    use super::*;
    use crate::testutil::TestEnv;

    fn addr() -> SocketAddr {
        "127.0.0.1:5190".parse().unwrap()
    }

    #[test]
    fn create_then_join_registers_participant() {
        let env = TestEnv::new();
        let registry = ChatRegistry::<TestEnv>::new();
        let room = registry.create_room("Lobby".into(), "alice".into(), ExchangeId::Public, &env);

        let (session, _rx) = Session::new("alice".into(), "Alice".into(), None, addr(), false, env);
        registry.join(&room.cookie, Arc::new(session)).expect("join");

        assert_eq!(room.sessions.len(), 1);
    }

    #[test]
    fn join_unknown_cookie_fails() {
        let registry = ChatRegistry::<TestEnv>::new();
        let env = TestEnv::new();
        let (session, _rx) = Session::new("alice".into(), "Alice".into(), None, addr(), false, env);
        assert!(matches!(registry.join(&[0u8; 16], Arc::new(session)), Err(ChatError::RoomNotFound)));
    }

    #[test]
    fn last_participant_leaving_collects_the_room() {
        let env = TestEnv::new();
        let registry = ChatRegistry::<TestEnv>::new();
        let room = registry.create_room("Lobby".into(), "alice".into(), ExchangeId::Public, &env);
        let cookie = room.cookie;

        let (session, _rx) = Session::new("alice".into(), "Alice".into(), None, addr(), false, env);
        registry.join(&cookie, Arc::new(session)).unwrap();
        assert_eq!(registry.len(), 1);

        registry.leave(&cookie, "alice").unwrap();
        assert_eq!(registry.len(), 0);
        assert!(registry.get(&cookie).is_none());
    }

    #[test]
    fn room_survives_while_other_participants_remain() {
        let env = TestEnv::new();
        let registry = ChatRegistry::<TestEnv>::new();
        let room = registry.create_room("Lobby".into(), "alice".into(), ExchangeId::Public, &env);
        let cookie = room.cookie;

        let (alice, _rx) = Session::new("alice".into(), "Alice".into(), None, addr(), false, env.clone());
        let (bob, _rx2) = Session::new("bob".into(), "Bob".into(), None, addr(), false, env);
        registry.join(&cookie, Arc::new(alice)).unwrap();
        registry.join(&cookie, Arc::new(bob)).unwrap();

        registry.leave(&cookie, "alice").unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(room.sessions.len(), 1);
    }
}
