//! Connection shells: the handshake each listener performs before handing a
//! connection off to [`crate::dispatcher::run_connection`].
//!
//! The auth shell (port 5190 in the default config) never reaches the
//! dispatcher: it only trades a screen name and password for a BOS-bound
//! cookie, then closes. Every other service (BOS, Chat, ChatNav, Alert,
//! BART — Admin rides along on the BOS session per [`ServiceId`]) shares
//! [`run_service_shell`]: crack the cookie the auth shell issued, register
//! the session, announce supported food groups, and hand off.

use std::{collections::HashMap, net::IpAddr, sync::Arc, time::Duration};

use bytes::{Bytes, BytesMut};
use oscar_core::{
    auth::{AuthService, Credentials, AUTH_DEADLINE_SECS},
    buddy::BuddyRegistry,
    chat::ChatRegistry,
    env::Environment,
    flap_client::FlapClient,
    rate_limit::{ClassId, RateClassParams, RateLimiter},
    session::Session,
    session_manager::SessionManager,
    CookieBaker, ServiceId,
};
use oscar_proto::{foodgroup, FlapFrame, FlapFrameType, SnacFrame, SnacHeader, Tlv, TlvBlock};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tokio_util::sync::CancellationToken;

use crate::{
    dispatcher,
    error::{HandshakeError, ServerError},
    router::{Router, RouterContext},
};

async fn read_flap_frame(stream: &mut TcpStream) -> Result<FlapFrame, HandshakeError> {
    let mut header_buf = [0u8; oscar_proto::FLAP_HEADER_SIZE];
    stream.read_exact(&mut header_buf).await?;
    let header = FlapFrame::decode_header(&header_buf)?;

    let mut payload = vec![0u8; header.payload_len() as usize];
    stream.read_exact(&mut payload).await?;
    Ok(FlapFrame::from_parts(&header, Bytes::from(payload))?)
}

async fn write_flap_frame(
    stream: &mut TcpStream,
    flap_client: &mut FlapClient,
    frame_type: FlapFrameType,
    payload: Bytes,
) -> Result<(), HandshakeError> {
    let buf = flap_client.encode_frame(frame_type, payload)?;
    stream.write_all(&buf).await?;
    Ok(())
}

async fn read_signon_tlvs(stream: &mut TcpStream) -> Result<TlvBlock, HandshakeError> {
    let frame = timeout(Duration::from_secs(AUTH_DEADLINE_SECS), read_flap_frame(stream))
        .await
        .map_err(|_| HandshakeError::Timeout)??;
    if !matches!(frame.frame_type, FlapFrameType::SignOn) {
        return Err(HandshakeError::Protocol(oscar_proto::ProtocolError::UnknownFrameType(
            frame.frame_type as u8,
        )));
    }
    Ok(TlvBlock::decode(frame.payload)?)
}

fn require_screen_name(tlvs: &TlvBlock) -> Result<String, HandshakeError> {
    tlvs.get(foodgroup::tlv_tag::SCREEN_NAME)
        .map(|t| t.as_str_lossy().into_owned())
        .ok_or_else(|| HandshakeError::Protocol(oscar_proto::ProtocolError::TruncatedTlv {
            tag: foodgroup::tlv_tag::SCREEN_NAME,
            declared: 1,
            remaining: 0,
        }))
}

/// Run the auth-service handshake to completion: FLAP-era roasted-password
/// login if the signon TLVs carry [`foodgroup::tlv_tag::ROASTED_PASSWORD`],
/// otherwise a BUCP challenge/response exchange carried in
/// [`foodgroup::FOOD_GROUP_BUCP`] SNACs on the same connection. Either path
/// ends with a cookie (success) or an error TLV (failure) written back, and
/// the connection is then closed by the caller — clients reconnect to BOS
/// with the cookie.
pub async fn run_auth_shell<E: Environment, C: Credentials>(
    mut stream: TcpStream,
    auth: Arc<AuthService<E, C>>,
    bos_advertise: String,
) -> Result<(), HandshakeError> {
    let remote: IpAddr = stream.peer_addr()?.ip();
    let mut flap_client = FlapClient::new();

    let signon = read_signon_tlvs(&mut stream).await?;
    let ident = require_screen_name(&signon)?;

    let outcome = if let Some(roasted) = signon.get(foodgroup::tlv_tag::ROASTED_PASSWORD) {
        auth.flap_login(&ident, &roasted.value, remote)
    } else {
        bucp_exchange(&mut stream, &mut flap_client, &auth, &ident, remote).await?
    };

    match outcome {
        Ok(cookie) => {
            let mut reply = TlvBlock::new();
            reply.push(Tlv::string(foodgroup::tlv_tag::SCREEN_NAME, &ident));
            reply.push(Tlv::new(foodgroup::tlv_tag::AUTH_COOKIE, cookie));
            reply.push(Tlv::string(foodgroup::tlv_tag::RECONNECT_HOST, &bos_advertise));
            let mut body = BytesMut::new();
            reply.encode(&mut body);
            write_flap_frame(&mut stream, &mut flap_client, FlapFrameType::SignOff, body.freeze())
                .await?;
            tracing::debug!(ident = %ident, "auth succeeded, issued BOS cookie");
            Ok(())
        }
        Err(err) => {
            let mut reply = TlvBlock::new();
            reply.push(Tlv::u16(foodgroup::tlv_tag::ERROR_CODE, 0x0004));
            let mut body = BytesMut::new();
            reply.encode(&mut body);
            let _ = write_flap_frame(&mut stream, &mut flap_client, FlapFrameType::SignOff, body.freeze())
                .await;
            tracing::debug!(ident = %ident, error = %err, "auth failed");
            Err(HandshakeError::Auth(err))
        }
    }
}

/// BUCP is carried as ordinary SNACs on the auth connection, not as
/// additional FLAP frame types: a `CHALLENGE_REQUEST` followed by a
/// `LOGIN_REQUEST`, both under [`foodgroup::FOOD_GROUP_BUCP`]. The hashed
/// response reuses [`foodgroup::tlv_tag::ROASTED_PASSWORD`] as its carrier
/// tag rather than introducing a second password TLV tag — a simplification
/// beyond what's needed to exercise the challenge/response shape.
async fn bucp_exchange<E: Environment, C: Credentials>(
    stream: &mut TcpStream,
    flap_client: &mut FlapClient,
    auth: &AuthService<E, C>,
    ident: &str,
    remote: IpAddr,
) -> Result<Result<Vec<u8>, oscar_core::AuthError>, HandshakeError> {
    let challenge = match auth.bucp_challenge(ident, remote) {
        Ok(challenge) => challenge,
        Err(err) => return Ok(Err(err)),
    };

    let mut body = TlvBlock::new();
    body.push(Tlv::string(foodgroup::tlv_tag::BUCP_CHALLENGE, &challenge));
    let mut buf = BytesMut::new();
    body.encode(&mut buf);
    let header = SnacHeader {
        food_group: foodgroup::FOOD_GROUP_BUCP,
        sub_group: foodgroup::bucp::CHALLENGE_RESPONSE,
        flags: 0,
        request_id: 0,
    };
    let snac = SnacFrame::new(header, buf.freeze());
    let mut data = BytesMut::new();
    snac.encode(&mut data);
    write_flap_frame(stream, flap_client, FlapFrameType::Data, data.freeze()).await?;

    let frame = timeout(Duration::from_secs(AUTH_DEADLINE_SECS), read_flap_frame(stream))
        .await
        .map_err(|_| HandshakeError::Timeout)??;
    if !matches!(frame.frame_type, FlapFrameType::Data) {
        return Err(HandshakeError::Protocol(oscar_proto::ProtocolError::UnknownFrameType(
            frame.frame_type as u8,
        )));
    }
    let login = SnacFrame::decode(frame.payload)?;
    let tlvs = TlvBlock::decode(login.body)?;
    let hashed = tlvs
        .get(foodgroup::tlv_tag::ROASTED_PASSWORD)
        .map(|t| t.value.clone())
        .unwrap_or_default();

    Ok(auth.bucp_login(ident, &challenge, &hashed, remote))
}

/// Per-service state that only some shells need. Modeled as a tagged union
/// rather than two independent `Option` fields so a BOS shell can't be built
/// without its buddy registry, nor a Chat/ChatNav shell without the room
/// registry — the nil check moves to construction time in `listener.rs`
/// instead of living in every place that reads the field.
pub enum ServiceExtras<E: Environment> {
    /// BOS: registers presence and fans out arrival/departure.
    Bos(Arc<BuddyRegistry>),
    /// Chat or ChatNav: joins/creates rooms in the shared registry.
    Chat(Arc<ChatRegistry<E>>),
    /// Alert and BART need neither.
    None,
}

impl<E: Environment> Clone for ServiceExtras<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Bos(buddies) => Self::Bos(buddies.clone()),
            Self::Chat(chat_rooms) => Self::Chat(chat_rooms.clone()),
            Self::None => Self::None,
        }
    }
}

/// Shared state for every post-auth service connection, built once by the
/// listener and cloned per accepted connection.
pub struct ServiceShellConfig<E: Environment> {
    /// Which service this shell instance serves.
    pub service: ServiceId,
    /// Cracks the cookie the auth shell issued.
    pub cookie_baker: Arc<CookieBaker<E>>,
    /// The global session registry (BOS/ChatNav/Alert/BART). Unused for
    /// Chat, whose participants live in the joined room's own registry.
    pub sessions: Arc<SessionManager<E>>,
    /// Service-specific extra state; see [`ServiceExtras`].
    pub extras: ServiceExtras<E>,
    /// The shared SNAC dispatch table.
    pub router: Arc<Router<E>>,
    /// Rate-class parameter overrides.
    pub rate_classes: HashMap<ClassId, RateClassParams>,
    /// The environment.
    pub env: E,
    /// Shutdown signal, cancelled on server stop.
    pub cancel: CancellationToken,
}

/// Food groups advertised in the `HostOnline` SNAC. A representative list
/// covering every route the router registers, not the full set a real AIM
/// server offers.
const ADVERTISED_FOOD_GROUPS: &[u16] = &[
    foodgroup::FOOD_GROUP_OSERVICE,
    foodgroup::FOOD_GROUP_BUDDY,
    foodgroup::FOOD_GROUP_ICBM,
    foodgroup::FOOD_GROUP_PERMIT_DENY,
    foodgroup::FOOD_GROUP_CHAT,
    foodgroup::FOOD_GROUP_CHAT_NAV,
];

fn host_online_snac() -> SnacFrame {
    let mut body = BytesMut::new();
    for &group in ADVERTISED_FOOD_GROUPS {
        body.extend_from_slice(&group.to_be_bytes());
    }
    let header = SnacHeader {
        food_group: foodgroup::FOOD_GROUP_OSERVICE,
        sub_group: foodgroup::oservice::HOST_ONLINE,
        flags: 0,
        request_id: 0,
    };
    SnacFrame::new(header, body.freeze())
}

fn arrival_snac(ident: &str) -> SnacFrame {
    let mut tlvs = TlvBlock::new();
    tlvs.push(Tlv::string(foodgroup::tlv_tag::SCREEN_NAME, ident));
    let mut body = BytesMut::new();
    tlvs.encode(&mut body);
    let header =
        SnacHeader { food_group: foodgroup::FOOD_GROUP_BUDDY, sub_group: foodgroup::buddy::ARRIVED, flags: 0, request_id: 0 };
    SnacFrame::new(header, body.freeze())
}

fn departure_snac(ident: &str) -> SnacFrame {
    let mut tlvs = TlvBlock::new();
    tlvs.push(Tlv::string(foodgroup::tlv_tag::SCREEN_NAME, ident));
    let mut body = BytesMut::new();
    tlvs.encode(&mut body);
    let header = SnacHeader {
        food_group: foodgroup::FOOD_GROUP_BUDDY,
        sub_group: foodgroup::buddy::DEPARTED,
        flags: 0,
        request_id: 0,
    };
    SnacFrame::new(header, body.freeze())
}

/// Run a post-auth service connection to completion: crack its cookie,
/// register the session (joining a chat room for the Chat service, wiring
/// buddy arrival/departure for BOS), announce supported food groups, then
/// hand off into [`dispatcher::run_connection`]. Cleans up its registration
/// on return regardless of how the dispatcher terminated.
pub async fn run_service_shell<E: Environment>(
    mut stream: TcpStream,
    config: ServiceShellConfig<E>,
) -> Result<(), ServerError> {
    let remote_addr = stream.peer_addr().map_err(HandshakeError::from)?;
    let mut flap_client = FlapClient::new();

    let signon = read_signon_tlvs(&mut stream).await.map_err(ServerError::from)?;
    let cookie_bytes = signon
        .get(foodgroup::tlv_tag::AUTH_COOKIE)
        .map(|t| t.value.clone())
        .ok_or_else(|| {
            ServerError::from(HandshakeError::Protocol(oscar_proto::ProtocolError::TruncatedTlv {
                tag: foodgroup::tlv_tag::AUTH_COOKIE,
                declared: 1,
                remaining: 0,
            }))
        })?;
    let cookie = config
        .cookie_baker
        .crack(&cookie_bytes, config.service)
        .map_err(HandshakeError::from)
        .map_err(ServerError::from)?;

    let ident = cookie.ident.clone();
    let (session, outbound_rx) =
        Session::new(ident.clone(), ident.clone(), None, remote_addr, false, config.env.clone());
    let session = Arc::new(session);

    let room_cookie: Option<[u8; 16]> = matches!(config.service, ServiceId::Chat)
        .then(|| cookie.extra.as_slice().try_into().ok())
        .flatten();

    let room_sessions = match (&config.extras, room_cookie) {
        (ServiceExtras::Chat(chat_rooms), Some(room_cookie)) => {
            let room = chat_rooms
                .join(&room_cookie, session.clone())
                .map_err(HandshakeError::from)
                .map_err(ServerError::from)?;
            room.sessions.clone()
        }
        _ => {
            config.sessions.add_session(session.clone());
            config.sessions.clone()
        }
    };

    if let ServiceExtras::Bos(buddies) = &config.extras {
        buddies.register(&ident, &[]);
        let watchers = buddies.watchers_of(&ident);
        config.sessions.relay_to_idents(&watchers, &arrival_snac(&ident));
    }

    let ctx = RouterContext {
        sessions: room_sessions,
        chat_rooms: match &config.extras {
            ServiceExtras::Chat(chat_rooms) => Some(chat_rooms.clone()),
            _ => None,
        },
        buddies: match &config.extras {
            ServiceExtras::Bos(buddies) => Some(buddies.clone()),
            _ => None,
        },
        env: config.env.clone(),
    };

    write_flap_frame(&mut stream, &mut flap_client, FlapFrameType::Data, {
        let mut data = BytesMut::new();
        host_online_snac().encode(&mut data);
        data.freeze()
    })
    .await
    .map_err(ServerError::from)?;

    let rate_limiter = RateLimiter::new(config.rate_classes.clone());
    let result = dispatcher::run_connection(
        stream,
        session.clone(),
        outbound_rx,
        config.router.clone(),
        ctx,
        rate_limiter,
        config.env.clone(),
        config.cancel.clone(),
        flap_client,
    )
    .await;

    match &config.extras {
        ServiceExtras::Chat(chat_rooms) => {
            if let Some(room_cookie) = room_cookie {
                let _ = chat_rooms.leave(&room_cookie, &ident);
            }
        }
        ServiceExtras::Bos(buddies) => {
            let watchers = buddies.watchers_of(&ident);
            config.sessions.relay_to_idents(&watchers, &departure_snac(&ident));
            config.sessions.remove_if_current(&ident, &session);
            buddies.unregister(&ident);
        }
        ServiceExtras::None => {
            config.sessions.remove_if_current(&ident, &session);
        }
    }

    result.map_err(ServerError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oscar_core::testutil::TestEnv;

    #[test]
    fn host_online_lists_every_advertised_food_group() {
        let snac = host_online_snac();
        assert_eq!(snac.header.route_key(), (foodgroup::FOOD_GROUP_OSERVICE, foodgroup::oservice::HOST_ONLINE));
        assert_eq!(snac.body.len(), ADVERTISED_FOOD_GROUPS.len() * 2);
    }

    #[test]
    fn arrival_and_departure_snacs_carry_ident() {
        let arrival = arrival_snac("alice");
        let tlvs = TlvBlock::decode(arrival.body).expect("decode");
        assert_eq!(tlvs.get(foodgroup::tlv_tag::SCREEN_NAME).unwrap().as_str_lossy(), "alice");

        let departure = departure_snac("bob");
        assert_eq!(departure.header.route_key(), (foodgroup::FOOD_GROUP_BUDDY, foodgroup::buddy::DEPARTED));
    }

    #[tokio::test]
    async fn auth_shell_rejects_unknown_user() {
        use oscar_core::auth::InMemoryCredentials;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let local_addr = listener.local_addr().expect("addr");
        let env = TestEnv::new();
        let auth = Arc::new(AuthService::new(
            CookieBaker::new(b"secret".to_vec(), env.clone()),
            InMemoryCredentials::new(),
            env,
        ));

        let client_fut = TcpStream::connect(local_addr);
        let (server_stream, mut client_stream) = tokio::join!(
            async { listener.accept().await.expect("accept").0 },
            async { client_fut.await.expect("connect") }
        );

        let server_fut = tokio::spawn(run_auth_shell(server_stream, auth, "127.0.0.1:5191".to_string()));

        let mut tlvs = TlvBlock::new();
        tlvs.push(Tlv::string(foodgroup::tlv_tag::SCREEN_NAME, "ghost"));
        tlvs.push(Tlv::new(foodgroup::tlv_tag::ROASTED_PASSWORD, Bytes::from_static(b"whatever")));
        let mut body = BytesMut::new();
        tlvs.encode(&mut body);
        let mut client_flap = FlapClient::new();
        let buf = client_flap.encode_frame(FlapFrameType::SignOn, body.freeze()).unwrap();
        client_stream.write_all(&buf).await.unwrap();

        let result = server_fut.await.expect("join");
        assert!(matches!(result, Err(HandshakeError::Auth(_))));
    }

    #[tokio::test]
    async fn bos_shell_registers_presence_and_unregisters_on_close() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let local_addr = listener.local_addr().expect("addr");
        let env = TestEnv::new();

        let cookie_baker = Arc::new(CookieBaker::new(b"secret".to_vec(), env.clone()));
        let cookie_bytes = cookie_baker.issue(ServiceId::Bos, "alice", &[]);

        let sessions = Arc::new(SessionManager::new());
        let buddies = Arc::new(BuddyRegistry::new());
        let shell_config = ServiceShellConfig {
            service: ServiceId::Bos,
            cookie_baker,
            sessions: sessions.clone(),
            extras: ServiceExtras::Bos(buddies.clone()),
            router: Arc::new(Router::new()),
            rate_classes: HashMap::new(),
            env: env.clone(),
            cancel: CancellationToken::new(),
        };

        let client_fut = TcpStream::connect(local_addr);
        let (server_stream, mut client_stream) = tokio::join!(
            async { listener.accept().await.expect("accept").0 },
            async { client_fut.await.expect("connect") }
        );

        let server_fut = tokio::spawn(run_service_shell(server_stream, shell_config));

        let mut tlvs = TlvBlock::new();
        tlvs.push(Tlv::new(foodgroup::tlv_tag::AUTH_COOKIE, Bytes::from(cookie_bytes)));
        let mut body = BytesMut::new();
        tlvs.encode(&mut body);
        let mut client_flap = FlapClient::new();
        let buf = client_flap.encode_frame(FlapFrameType::SignOn, body.freeze()).unwrap();
        client_stream.write_all(&buf).await.unwrap();

        let host_online = read_flap_frame(&mut client_stream).await.expect("host online frame");
        assert!(matches!(host_online.frame_type, FlapFrameType::Data));
        assert!(sessions.retrieve_by_ident("alice").is_some());

        drop(client_stream);
        let result = server_fut.await.expect("join");
        assert!(result.is_ok());
        assert!(sessions.retrieve_by_ident("alice").is_none());
    }
}
