//! Integration coverage spanning the auth shell and the config layer: the
//! pieces `shells.rs`'s own unit tests exercise separately, chained the way
//! a real client actually sees them.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use oscar_core::{
    auth::{AuthService, InMemoryCredentials},
    cookie::CookieBaker,
    flap_client::FlapClient,
    testutil::TestEnv,
    ServiceId,
};
use oscar_proto::{foodgroup, FlapFrame, FlapFrameType, Tlv, TlvBlock, FLAP_HEADER_SIZE};
use oscar_server::{config::RateClassOverride, shells::run_auth_shell, ServerConfig};
use proptest::prelude::*;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

async fn read_flap_frame(stream: &mut TcpStream) -> FlapFrame {
    let mut header_buf = [0u8; FLAP_HEADER_SIZE];
    stream.read_exact(&mut header_buf).await.expect("header");
    let header = FlapFrame::decode_header(&header_buf).expect("decode header");
    let mut payload = vec![0u8; header.payload_len() as usize];
    stream.read_exact(&mut payload).await.expect("payload");
    FlapFrame::from_parts(&header, Bytes::from(payload)).expect("frame")
}

/// The FLAP reply to a signon is itself a signoff (the auth connection
/// always closes after one exchange, success or failure) — never a second
/// signon. The cookie it carries must crack on the BOS side it names.
#[tokio::test]
async fn successful_login_replies_with_signoff_and_a_bos_cookie() {
    let creds = InMemoryCredentials::new();
    creds.add_account("alice");
    let env = TestEnv::new();
    let secret = b"integration-secret".to_vec();
    let auth =
        Arc::new(AuthService::new(CookieBaker::new(secret.clone(), env.clone()), creds, env.clone()));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let local_addr = listener.local_addr().expect("addr");

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        run_auth_shell(stream, auth, "127.0.0.1:5191".to_string()).await
    });

    let mut client = TcpStream::connect(local_addr).await.expect("connect");
    let mut flap_client = FlapClient::new();
    let mut signon = TlvBlock::new();
    signon.push(Tlv::string(foodgroup::tlv_tag::SCREEN_NAME, "alice"));
    let roasted: Vec<u8> = "alice".chars().rev().collect::<String>().into_bytes();
    signon.push(Tlv::new(foodgroup::tlv_tag::ROASTED_PASSWORD, roasted));
    let mut body = BytesMut::new();
    signon.encode(&mut body);
    let buf = flap_client.encode_frame(FlapFrameType::SignOn, body.freeze()).expect("encode");
    client.write_all(&buf).await.expect("write");

    let reply = read_flap_frame(&mut client).await;
    assert!(
        matches!(reply.frame_type, FlapFrameType::SignOff),
        "auth reply must be a SignOff frame, not {:?}",
        reply.frame_type
    );

    let tlvs = TlvBlock::decode(reply.payload).expect("reply tlvs");
    let cookie = tlvs.get(foodgroup::tlv_tag::AUTH_COOKIE).expect("cookie tlv").value.clone();

    server.await.expect("join").expect("auth shell");

    let cookie_baker = CookieBaker::new(secret, env);
    let cracked = cookie_baker.crack(&cookie, ServiceId::Bos).expect("cookie must crack for BOS");
    assert_eq!(cracked.ident, "alice");
}

proptest! {
    /// An arbitrary rate-class override survives the TOML-friendly config
    /// type's conversion into the core's keyed parameter table without
    /// losing or renaming any field.
    #[test]
    fn rate_class_override_round_trips_through_config(
        food_group in any::<u16>(),
        sub_group in any::<u16>(),
        window in 1u32..10_000,
        clear_level in any::<u32>(),
        alert_level in any::<u32>(),
        limit_level in any::<u32>(),
        disconnect_level in any::<u32>(),
        max_level in any::<u32>(),
        critical in any::<bool>(),
    ) {
        let mut config = ServerConfig::default();
        config.rate_classes.push(RateClassOverride {
            food_group,
            sub_group,
            window,
            clear_level,
            alert_level,
            limit_level,
            disconnect_level,
            max_level,
            critical,
        });

        let params = config.rate_class_params();
        let got = params
            .get(&(food_group, sub_group))
            .expect("override must be retrievable by its (food_group, sub_group) key");
        prop_assert_eq!(got.window, window);
        prop_assert_eq!(got.clear_level, clear_level);
        prop_assert_eq!(got.alert_level, alert_level);
        prop_assert_eq!(got.limit_level, limit_level);
        prop_assert_eq!(got.disconnect_level, disconnect_level);
        prop_assert_eq!(got.max_level, max_level);
        prop_assert_eq!(got.critical, critical);
        prop_assert_eq!(params.len(), 1);
    }
}
