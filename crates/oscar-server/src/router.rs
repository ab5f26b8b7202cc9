//! SNAC router: a static `(foodGroup, subGroup)` dispatch table built once
//! at construction, per the design note resolving "dynamic dispatch on SNAC
//! routing" to compile-time-typed closures rather than string-keyed
//! reflection.
//!
//! Per-food-group business logic beyond what is needed to exercise the
//! router (profile text, ICQ metadata handlers, buddy-icon upload, …) is an
//! external collaborator and out of scope; the handlers registered here are
//! the representative slice the dispatcher actually needs: presence
//! bookkeeping, instant messaging, chat fan-out, and room creation.

use std::{collections::HashMap, sync::Arc};

use bytes::{Buf, Bytes, BytesMut};
use oscar_core::{
    buddy::BuddyRegistry,
    chat::{ChatRegistry, ExchangeId},
    env::Environment,
    session::Session,
    session_manager::SessionManager,
};
use oscar_proto::{foodgroup, tlv::Tlv, SnacFrame, SnacHeader, TlvBlock};

use crate::error::RouterError;

/// Shared state a route handler may need. Not every field is populated for
/// every service shell — a chat shell's `sessions` is the room's own
/// manager, not the global BOS registry, and `chat_rooms`/`buddies` are
/// only meaningful on the BOS/chat-nav shells that use them.
pub struct RouterContext<E: Environment> {
    /// The session registry this connection's service operates over.
    pub sessions: Arc<SessionManager<E>>,
    /// The chat-room registry (BOS/chat-nav only).
    pub chat_rooms: Option<Arc<ChatRegistry<E>>>,
    /// The buddy-list watcher registry (BOS only).
    pub buddies: Option<Arc<BuddyRegistry>>,
    /// The environment, for room-cookie generation and timestamps.
    pub env: E,
}

type Handler<E> = Box<
    dyn Fn(&RouterContext<E>, &Arc<Session<E>>, &SnacFrame) -> Result<Vec<SnacFrame>, RouterError>
        + Send
        + Sync,
>;

/// The `(foodGroup, subGroup)` dispatch table.
pub struct Router<E: Environment> {
    handlers: HashMap<(u16, u16), Handler<E>>,
}

impl<E: Environment> Router<E> {
    /// Build the router, registering every known route once.
    #[must_use]
    pub fn new() -> Self {
        let mut handlers: HashMap<(u16, u16), Handler<E>> = HashMap::new();

        handlers.insert(
            (foodgroup::FOOD_GROUP_OSERVICE, foodgroup::oservice::CLIENT_ONLINE),
            Box::new(|_ctx, session, _frame| {
                tracing::debug!(ident = %session.ident, "client online");
                Ok(vec![])
            }),
        );

        handlers.insert(
            (foodgroup::FOOD_GROUP_OSERVICE, foodgroup::oservice::IDLE_REPORT),
            Box::new(|ctx, session, frame| {
                let mut buf = frame.body.clone();
                let idle_secs = if buf.remaining() >= 4 { buf.get_u32() } else { 0 };
                if idle_secs == 0 {
                    session.set_idle(None);
                } else {
                    session.set_idle(Some(ctx.env.now()));
                }
                Ok(vec![])
            }),
        );

        handlers.insert(
            (foodgroup::FOOD_GROUP_OSERVICE, foodgroup::oservice::RATE_PARAMS_SUB_ADD),
            Box::new(|_ctx, _session, _frame| Ok(vec![])),
        );

        handlers.insert(
            (foodgroup::FOOD_GROUP_PERMIT_DENY, foodgroup::permit_deny::SET_GROUP_PERMIT_MASK),
            Box::new(|_ctx, session, _frame| {
                tracing::debug!(ident = %session.ident, "PermitDenySetGroupPermitMask accepted, not enforced");
                Ok(vec![])
            }),
        );

        handlers.insert(
            (foodgroup::FOOD_GROUP_ICBM, foodgroup::icbm::CHANNEL_MSG_TO_HOST),
            Box::new(|ctx, session, frame| {
                let (cookie, channel, tlvs) = decode_icbm_body(&frame.body)?;
                let Some(dest) = tlvs.get(0x0001).map(|t| t.as_str_lossy().into_owned()) else {
                    return Ok(vec![]);
                };
                let Some(message) = tlvs.get(0x0002) else { return Ok(vec![]) };

                let mut reply_tlvs = TlvBlock::new();
                reply_tlvs.push(Tlv::string(0x0001, &session.ident));
                reply_tlvs.push(Tlv::new(0x0002, message.value.clone()));

                let reply = encode_icbm_msg(
                    foodgroup::icbm::CHANNEL_MSG_TO_CLIENT,
                    frame.header.request_id,
                    cookie,
                    channel,
                    &reply_tlvs,
                );
                ctx.sessions.relay_to_ident(&dest, reply);
                Ok(vec![])
            }),
        );

        handlers.insert(
            (foodgroup::FOOD_GROUP_CHAT, foodgroup::chat::CHANNEL_MSG_TO_HOST),
            Box::new(|ctx, session, frame| {
                let tlvs = TlvBlock::decode(frame.body.clone())?;
                let Some(message) = tlvs.get(0x0001) else { return Ok(vec![]) };

                let mut reply_tlvs = TlvBlock::new();
                reply_tlvs.push(Tlv::string(0x0001, &session.ident));
                reply_tlvs.push(Tlv::new(0x0002, message.value.clone()));
                let mut body = BytesMut::new();
                reply_tlvs.encode(&mut body);

                let header = SnacHeader {
                    food_group: foodgroup::FOOD_GROUP_CHAT,
                    sub_group: foodgroup::chat::CHANNEL_MSG_TO_CLIENT,
                    flags: 0,
                    request_id: frame.header.request_id,
                };
                let reply = SnacFrame::new(header, body.freeze());

                let sender = session.ident.clone();
                ctx.sessions.broadcast(&reply, |ident| ident != sender.as_str());
                Ok(vec![])
            }),
        );

        handlers.insert(
            (foodgroup::FOOD_GROUP_CHAT_NAV, foodgroup::chat_nav::CREATE_ROOM),
            Box::new(|ctx, session, frame| {
                let tlvs = TlvBlock::decode(frame.body.clone())?;
                let name = tlvs.get(0x0001).map_or_else(|| "Chat Room".to_string(), |t| t.as_str_lossy().into_owned());
                let Some(chat_rooms) = &ctx.chat_rooms else {
                    tracing::warn!("CreateRoom received on a shell with no chat registry");
                    return Ok(vec![]);
                };

                let room = chat_rooms.create_room(name.clone(), session.ident.clone(), ExchangeId::Public, &ctx.env);

                let mut reply_tlvs = TlvBlock::new();
                reply_tlvs.push(Tlv::new(0x0001, Bytes::copy_from_slice(&room.cookie)));
                reply_tlvs.push(Tlv::string(0x0002, &name));
                let mut body = BytesMut::new();
                reply_tlvs.encode(&mut body);

                let header = SnacHeader {
                    food_group: foodgroup::FOOD_GROUP_CHAT_NAV,
                    sub_group: foodgroup::chat_nav::ROOM_INFO_RESPONSE,
                    flags: 0,
                    request_id: frame.header.request_id,
                };
                Ok(vec![SnacFrame::new(header, body.freeze())])
            }),
        );

        Self { handlers }
    }

    /// Dispatch `frame` to its registered handler.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::RouteNotFound`] if no handler is registered
    /// for the frame's `(foodGroup, subGroup)`.
    pub fn dispatch(
        &self,
        ctx: &RouterContext<E>,
        session: &Arc<Session<E>>,
        frame: &SnacFrame,
    ) -> Result<Vec<SnacFrame>, RouterError> {
        let key = frame.header.route_key();
        let Some(handler) = self.handlers.get(&key) else {
            return Err(RouterError::RouteNotFound { food_group: key.0, sub_group: key.1 });
        };
        tracing::trace!(food_group = key.0, sub_group = key.1, "routed SNAC");
        handler(ctx, session, frame)
    }
}

impl<E: Environment> Default for Router<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the invalid-SNAC error reply for an unroutable `(foodGroup,
/// subGroup)` pair, per §4.7: `subGroup 0x01` of the requested food group.
#[must_use]
pub fn invalid_snac_reply(food_group: u16, request_id: u32) -> SnacFrame {
    let header = SnacHeader { food_group, sub_group: foodgroup::SUB_GROUP_ERROR, flags: 0, request_id };
    SnacFrame::new(header, Bytes::new())
}

fn decode_icbm_body(body: &Bytes) -> Result<(u64, u16, TlvBlock), RouterError> {
    let mut buf = body.clone();
    if buf.remaining() < 10 {
        return Err(RouterError::MalformedBody(oscar_proto::ProtocolError::TruncatedTlv {
            tag: 0,
            declared: 10,
            remaining: buf.remaining(),
        }));
    }
    let cookie = buf.get_u64();
    let channel = buf.get_u16();
    let tlvs = TlvBlock::decode(buf)?;
    Ok((cookie, channel, tlvs))
}

fn encode_icbm_msg(sub_group: u16, request_id: u32, cookie: u64, channel: u16, tlvs: &TlvBlock) -> SnacFrame {
    let mut body = BytesMut::new();
    body.extend_from_slice(&cookie.to_be_bytes());
    body.extend_from_slice(&channel.to_be_bytes());
    tlvs.encode(&mut body);

    let header =
        SnacHeader { food_group: foodgroup::FOOD_GROUP_ICBM, sub_group, flags: 0, request_id };
    SnacFrame::new(header, body.freeze())
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;
    use oscar_core::testutil::TestEnv;

    fn addr() -> SocketAddr {
        "127.0.0.1:5190".parse().unwrap()
    }

    fn ctx(env: TestEnv) -> (RouterContext<TestEnv>, Arc<SessionManager<TestEnv>>) {
        let sessions = Arc::new(SessionManager::new());
        let ctx = RouterContext {
            sessions: sessions.clone(),
            chat_rooms: Some(Arc::new(ChatRegistry::new())),
            buddies: Some(Arc::new(BuddyRegistry::new())),
            env,
        };
        (ctx, sessions)
    }

    #[test]
    fn unknown_route_reports_route_not_found() {
        let router = Router::<TestEnv>::new();
        let env = TestEnv::new();
        let (ctx, sessions) = ctx(env.clone());
        let (alice, _rx) = Session::new("alice".into(), "Alice".into(), None, addr(), false, env);
        let alice = Arc::new(alice);
        sessions.add_session(alice.clone());

        let header = SnacHeader { food_group: 0x55, sub_group: 0x02, flags: 0, request_id: 42 };
        let frame = SnacFrame::new(header, Bytes::new());
        assert!(matches!(
            router.dispatch(&ctx, &alice, &frame),
            Err(RouterError::RouteNotFound { food_group: 0x55, sub_group: 0x02 })
        ));
    }

    #[test]
    fn icbm_channel_msg_relays_to_destination() {
        let router = Router::<TestEnv>::new();
        let env = TestEnv::new();
        let (ctx, sessions) = ctx(env.clone());

        let (alice, _rx_a) = Session::new("alice".into(), "Alice".into(), None, addr(), false, env.clone());
        let alice = Arc::new(alice);
        sessions.add_session(alice.clone());
        let (bob, mut rx_b) = Session::new("bob".into(), "Bob".into(), None, addr(), false, env);
        sessions.add_session(Arc::new(bob));

        let mut tlvs = TlvBlock::new();
        tlvs.push(Tlv::string(0x0001, "bob"));
        tlvs.push(Tlv::string(0x0002, "hi"));
        let mut body = BytesMut::new();
        body.extend_from_slice(&1u64.to_be_bytes());
        body.extend_from_slice(&1u16.to_be_bytes());
        tlvs.encode(&mut body);

        let header = SnacHeader {
            food_group: foodgroup::FOOD_GROUP_ICBM,
            sub_group: foodgroup::icbm::CHANNEL_MSG_TO_HOST,
            flags: 0,
            request_id: 7,
        };
        let frame = SnacFrame::new(header, body.freeze());
        router.dispatch(&ctx, &alice, &frame).expect("dispatch");

        let relayed = rx_b.try_recv().expect("bob receives");
        assert_eq!(relayed.header.route_key(), (foodgroup::FOOD_GROUP_ICBM, foodgroup::icbm::CHANNEL_MSG_TO_CLIENT));
    }

    #[test]
    fn chat_nav_create_room_registers_room() {
        let router = Router::<TestEnv>::new();
        let env = TestEnv::new();
        let (ctx, sessions) = ctx(env.clone());
        let (alice, _rx) = Session::new("alice".into(), "Alice".into(), None, addr(), false, env);
        let alice = Arc::new(alice);
        sessions.add_session(alice.clone());

        let mut tlvs = TlvBlock::new();
        tlvs.push(Tlv::string(0x0001, "Lobby"));
        let mut body = BytesMut::new();
        tlvs.encode(&mut body);

        let header = SnacHeader {
            food_group: foodgroup::FOOD_GROUP_CHAT_NAV,
            sub_group: foodgroup::chat_nav::CREATE_ROOM,
            flags: 0,
            request_id: 3,
        };
        let frame = SnacFrame::new(header, body.freeze());
        let replies = router.dispatch(&ctx, &alice, &frame).expect("dispatch");

        assert_eq!(replies.len(), 1);
        assert_eq!(ctx.chat_rooms.unwrap().len(), 1);
    }
}
