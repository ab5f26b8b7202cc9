//! Per-connection core: a `tokio::select!` loop over five event sources —
//! inbound FLAP frames, the session's outbound relay queue, a housekeeping
//! tick, session eviction, and server shutdown — per the design's
//! resolution of the coroutine-style dispatcher to plain `tokio::select!`
//! rather than a Sans-IO action/executor split.
//!
//! The same [`FlapClient`] instance threads through both the inbound-reply
//! path and the outbound-relay path so the FLAP sequence counter advances
//! atomically across both; this is the reason the dispatcher owns a single
//! write half rather than handing it to multiple tasks. The caller (a
//! service shell) passes in the [`FlapClient`] it used for its own
//! handshake replies so the sequence counter carries over onto this same
//! connection rather than resetting to zero mid-stream.

use std::{sync::Arc, time::Duration};

use bytes::{BufMut, Bytes, BytesMut};
use oscar_core::{
    env::Environment,
    flap_client::FlapClient,
    rate_limit::{RateLimiter, RateState},
    session::Session,
};
use oscar_proto::{foodgroup, FlapFrame, FlapFrameType, SnacFrame, SnacHeader, Tlv, TlvBlock};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{DispatchError, RouterError},
    router::{invalid_snac_reply, Router, RouterContext},
};

/// How often the dispatcher wakes up with no inbound/outbound activity.
/// Currently used only for periodic tracing; reserved for future idle/ping
/// housekeeping.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Bound on the channel feeding decoded frames from the reader task to the
/// dispatch loop.
const INBOUND_QUEUE_CAPACITY: usize = 32;

enum Action {
    Continue,
    Stop,
}

/// Drive one connection to completion: read FLAP frames, route SNACs,
/// relay outbound traffic, and react to eviction or shutdown.
///
/// Returns `Ok(())` on a clean peer-initiated signoff or reader EOF; `Err`
/// for every other termination reason (malformed input, rate-critical
/// disconnect, eviction, shutdown, I/O failure).
pub async fn run_connection<E: Environment>(
    stream: TcpStream,
    session: Arc<Session<E>>,
    mut outbound_rx: mpsc::Receiver<SnacFrame>,
    router: Arc<Router<E>>,
    ctx: RouterContext<E>,
    mut rate_limiter: RateLimiter<E>,
    env: E,
    cancel: CancellationToken,
    mut flap_client: FlapClient,
) -> Result<(), DispatchError> {
    let (read_half, mut write_half) = stream.into_split();
    let (frame_tx, mut frame_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);
    let reader_handle = tokio::spawn(run_reader(read_half, frame_tx));

    let mut tick = tokio::time::interval(TICK_INTERVAL);

    let result = loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                match frame {
                    None => break Ok(()),
                    Some(Err(err)) => break Err(err),
                    Some(Ok(flap_frame)) => {
                        match handle_inbound(
                            flap_frame,
                            &session,
                            &router,
                            &ctx,
                            &mut rate_limiter,
                            &env,
                            &mut flap_client,
                            &mut write_half,
                        )
                        .await
                        {
                            Ok(Action::Continue) => {}
                            Ok(Action::Stop) => break Ok(()),
                            Err(err) => break Err(err),
                        }
                    }
                }
            }

            outbound = outbound_rx.recv() => {
                if let Some(snac) = outbound {
                    if let Err(err) = send_snac(&mut flap_client, &mut write_half, &snac).await {
                        break Err(err);
                    }
                }
            }

            _ = tick.tick() => {
                tracing::trace!(ident = %session.ident, "dispatcher tick");
            }

            () = session.closed() => {
                let _ = send_signoff(&mut flap_client, &mut write_half, "relogin").await;
                break Err(DispatchError::SessionEvicted);
            }

            () = cancel.cancelled() => {
                let _ = send_signoff(&mut flap_client, &mut write_half, "server shutdown").await;
                break Err(DispatchError::Shutdown);
            }
        }
    };

    reader_handle.abort();
    result
}

async fn run_reader(
    mut reader: OwnedReadHalf,
    tx: mpsc::Sender<Result<FlapFrame, DispatchError>>,
) {
    loop {
        let frame = read_flap_frame(&mut reader).await;
        let fatal = frame.is_err();
        if tx.send(frame).await.is_err() || fatal {
            return;
        }
    }
}

async fn read_flap_frame(reader: &mut OwnedReadHalf) -> Result<FlapFrame, DispatchError> {
    let mut header_buf = [0u8; oscar_proto::FLAP_HEADER_SIZE];
    reader.read_exact(&mut header_buf).await?;
    let header = FlapFrame::decode_header(&header_buf)?;

    let mut payload = vec![0u8; header.payload_len() as usize];
    reader.read_exact(&mut payload).await?;
    let frame = FlapFrame::from_parts(&header, Bytes::from(payload))?;
    Ok(frame)
}

#[allow(clippy::too_many_arguments)]
async fn handle_inbound<E: Environment>(
    frame: FlapFrame,
    session: &Arc<Session<E>>,
    router: &Router<E>,
    ctx: &RouterContext<E>,
    rate_limiter: &mut RateLimiter<E>,
    env: &E,
    flap_client: &mut FlapClient,
    write_half: &mut OwnedWriteHalf,
) -> Result<Action, DispatchError> {
    match frame.frame_type {
        FlapFrameType::SignOn => {
            Err(DispatchError::ProtocolViolation("unexpected signon mid-session"))
        }
        FlapFrameType::Error => {
            Err(DispatchError::ProtocolViolation("peer sent a FLAP error frame"))
        }
        FlapFrameType::SignOff => Ok(Action::Stop),
        FlapFrameType::KeepAlive => Ok(Action::Continue),
        FlapFrameType::Data => {
            let snac = SnacFrame::decode(frame.payload)?;
            let class_id = (snac.header.food_group, snac.header.sub_group);
            let (state, transitioned) = rate_limiter.record(class_id, env.now());

            if transitioned {
                tracing::debug!(ident = %session.ident, ?class_id, ?state, "rate class transitioned");
                let change = rate_param_change_snac(class_id, state);
                send_snac(flap_client, write_half, &change).await?;
            }

            if state == RateState::Disconnect {
                return Err(DispatchError::RateDisconnect(class_id));
            }
            if state == RateState::Limited {
                tracing::debug!(ident = %session.ident, ?class_id, "dropping SNAC: rate limited");
                return Ok(Action::Continue);
            }

            match router.dispatch(ctx, session, &snac) {
                Ok(replies) => {
                    for reply in replies {
                        send_snac(flap_client, write_half, &reply).await?;
                    }
                }
                Err(RouterError::RouteNotFound { food_group, .. }) => {
                    let reply = invalid_snac_reply(food_group, snac.header.request_id);
                    send_snac(flap_client, write_half, &reply).await?;
                }
                Err(RouterError::MalformedBody(err)) => return Err(DispatchError::MalformedFrame(err)),
            }
            Ok(Action::Continue)
        }
    }
}

async fn send_snac(
    flap_client: &mut FlapClient,
    write_half: &mut OwnedWriteHalf,
    snac: &SnacFrame,
) -> Result<(), DispatchError> {
    let buf = flap_client.encode_snac(snac)?;
    write_half.write_all(&buf).await?;
    Ok(())
}

async fn send_signoff(
    flap_client: &mut FlapClient,
    write_half: &mut OwnedWriteHalf,
    reason: &str,
) -> Result<(), DispatchError> {
    let mut tlvs = TlvBlock::new();
    tlvs.push(Tlv::string(foodgroup::tlv_tag::DISCONNECT_REASON, reason));
    let mut body = BytesMut::new();
    tlvs.encode(&mut body);

    let buf = flap_client.encode_frame(FlapFrameType::SignOff, body.freeze())?;
    write_half.write_all(&buf).await?;
    Ok(())
}

/// Build the (simplified) `OServiceRateParamChange` SNAC: a one-byte state
/// code followed by the big-endian food group and sub group. Full wire
/// fidelity for this message is beyond what's needed to exercise rate-class
/// transitions.
fn rate_param_change_snac(class_id: (u16, u16), state: RateState) -> SnacFrame {
    let code: u8 = match state {
        RateState::Clear => 1,
        RateState::Alert => 2,
        RateState::Limited => 3,
        RateState::Disconnect => 4,
    };
    let mut body = BytesMut::new();
    body.put_u8(code);
    body.put_u16(class_id.0);
    body.put_u16(class_id.1);

    let header = SnacHeader {
        food_group: foodgroup::FOOD_GROUP_OSERVICE,
        sub_group: foodgroup::oservice::RATE_PARAM_CHANGE,
        flags: 0,
        request_id: 0,
    };
    SnacFrame::new(header, body.freeze())
}
