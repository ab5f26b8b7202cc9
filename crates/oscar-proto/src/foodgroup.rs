//! Fixed food-group and well-known sub-group/TLV wire constants.
//!
//! These values are dictated by period AIM/ICQ client behavior (see §6 of
//! the design) and must be reproduced verbatim; they are not design choices.

/// Generic service-control operations shared by every server.
pub const FOOD_GROUP_OSERVICE: u16 = 0x0001;
/// Locate: user-info / directory lookups.
pub const FOOD_GROUP_LOCATE: u16 = 0x0002;
/// Buddy list presence.
pub const FOOD_GROUP_BUDDY: u16 = 0x0003;
/// ICBM: instant messaging.
pub const FOOD_GROUP_ICBM: u16 = 0x0004;
/// Advertisements (legacy, accepted and ignored).
pub const FOOD_GROUP_ADVERT: u16 = 0x0005;
/// Invite-a-friend (legacy, accepted and ignored).
pub const FOOD_GROUP_INVITE: u16 = 0x0006;
/// Administrative account operations.
pub const FOOD_GROUP_ADMIN: u16 = 0x0007;
/// Popup notices (legacy, accepted and ignored).
pub const FOOD_GROUP_POPUP: u16 = 0x0008;
/// Permit/deny visibility lists.
pub const FOOD_GROUP_PERMIT_DENY: u16 = 0x0009;
/// User-lookup / search.
pub const FOOD_GROUP_USER_LOOKUP: u16 = 0x000a;
/// Usage statistics reporting.
pub const FOOD_GROUP_STATS: u16 = 0x000b;
/// Chat-nav: room directory and creation.
pub const FOOD_GROUP_CHAT_NAV: u16 = 0x000d;
/// Chat: in-room messaging.
pub const FOOD_GROUP_CHAT: u16 = 0x000e;
/// ODir: online directory search.
pub const FOOD_GROUP_ODIR: u16 = 0x000f;
/// BART: buddy icon / asset transfer.
pub const FOOD_GROUP_BART: u16 = 0x0010;
/// Feedbag: server-side buddy list storage.
pub const FOOD_GROUP_FEEDBAG: u16 = 0x0013;
/// BUCP: challenge/response login, carried on the auth connection only.
pub const FOOD_GROUP_BUCP: u16 = 0x0017;
/// ICQ-specific metadata sub-protocol.
pub const FOOD_GROUP_ICQ: u16 = 0x0015;

/// Sub-group used uniformly across food groups for "invalid SNAC" errors:
/// `subGroup 0x01` of whichever food group received an unroutable request.
pub const SUB_GROUP_ERROR: u16 = 0x0001;

/// OService sub-groups.
pub mod oservice {
    /// Server → client: enumerates the food groups this service offers.
    pub const HOST_ONLINE: u16 = 0x0003;
    /// Client → server: BUCP-era capability/versions announcement.
    pub const CLIENT_ONLINE: u16 = 0x0002;
    /// Server → client: rate limit class parameters and transitions.
    pub const RATE_PARAMS_REPLY: u16 = 0x0007;
    /// Server → client: a rate class transitioned state.
    pub const RATE_PARAM_CHANGE: u16 = 0x000a;
    /// Client → server: acknowledges rate params, completing the handshake.
    pub const RATE_PARAMS_SUB_ADD: u16 = 0x0008;
    /// Client → server: keep-alive style idle report (handled, logged).
    pub const IDLE_REPORT: u16 = 0x0011;
    /// Server → client: disconnect notice, e.g. new-login eviction.
    pub const SERVICE_DISCONNECT: u16 = 0x0001;
}

/// ICBM sub-groups.
pub mod icbm {
    /// Client → server: send an instant message.
    pub const CHANNEL_MSG_TO_HOST: u16 = 0x0006;
    /// Server → client: deliver an instant message.
    pub const CHANNEL_MSG_TO_CLIENT: u16 = 0x0007;
}

/// Chat sub-groups.
pub mod chat {
    /// Client → server: send a chat-room message.
    pub const CHANNEL_MSG_TO_HOST: u16 = 0x0005;
    /// Server → client: deliver a chat-room message.
    pub const CHANNEL_MSG_TO_CLIENT: u16 = 0x0006;
    /// Server → client: one or more users joined the room.
    pub const USERS_JOINED: u16 = 0x0003;
    /// Server → client: one or more users left the room.
    pub const USERS_LEFT: u16 = 0x0004;
    /// Server → client: room metadata, sent to a freshly joined client.
    pub const ROOM_INFO_UPDATE: u16 = 0x0002;
}

/// Buddy presence sub-groups.
pub mod buddy {
    /// Server → client: a watched buddy came online.
    pub const ARRIVED: u16 = 0x000b;
    /// Server → client: a watched buddy went offline.
    pub const DEPARTED: u16 = 0x000c;
}

/// Chat-nav sub-groups.
pub mod chat_nav {
    /// Client → server: create a new chat room.
    pub const CREATE_ROOM: u16 = 0x0008;
    /// Server → client: room-creation result (cookie + metadata).
    pub const ROOM_INFO_RESPONSE: u16 = 0x0009;
}

/// BUCP sub-groups (carried inside the OService food group's BUCP variant on
/// the auth connection).
pub mod bucp {
    /// Client → server: requests a login challenge for a screen name.
    pub const CHALLENGE_REQUEST: u16 = 0x0006;
    /// Server → client: the login challenge.
    pub const CHALLENGE_RESPONSE: u16 = 0x0007;
    /// Client → server: hashed-password login attempt.
    pub const LOGIN_REQUEST: u16 = 0x0002;
    /// Server → client: login outcome (cookie, reconnect host, or error).
    pub const LOGIN_RESPONSE: u16 = 0x0003;
}

/// Permit/deny sub-groups.
pub mod permit_deny {
    /// Client → server: sets the group-level permit mask. Accepted and
    /// logged but does not alter visibility (documented partial support).
    pub const SET_GROUP_PERMIT_MASK: u16 = 0x0002;
}

/// ICQ sub-groups.
pub mod icq {
    /// The sole ICQ sub-group: a little-endian metadata envelope (see
    /// [`crate::icq`]).
    pub const DB_QUERY: u16 = 0x0002;
}

/// Well-known TLV tags used on the signon/login path.
pub mod tlv_tag {
    /// Screen name (FLAP signon and BUCP login).
    pub const SCREEN_NAME: u16 = 0x0001;
    /// Client description string.
    pub const CLIENT_STRING: u16 = 0x0003;
    /// Opaque auth cookie handed from auth to a service connection.
    pub const AUTH_COOKIE: u16 = 0x0006;
    /// Reconnect host (`host:port`), sent with a cookie.
    pub const RECONNECT_HOST: u16 = 0x0005;
    /// Client version number.
    pub const CLIENT_VERSION: u16 = 0x0017;
    /// Roasted (XOR-obfuscated) password, FLAP auth only.
    pub const ROASTED_PASSWORD: u16 = 0x0025;
    /// Error code, present on auth/login failure responses.
    pub const ERROR_CODE: u16 = 0x0008;
    /// BUCP challenge string.
    pub const BUCP_CHALLENGE: u16 = 0x0001;
    /// Carried on a server-initiated FLAP `SignOff`: a short human-readable
    /// reason (e.g. `"relogin"`, `"server shutdown"`).
    pub const DISCONNECT_REASON: u16 = 0x0009;
}
