//! Plain-TCP listener wiring: binds the six configured service addresses
//! and spawns the matching shell per accepted connection.
//!
//! The teacher transports frames over Quinn/QUIC streams; OSCAR is a
//! plain-TCP, one-connection-per-service protocol (the "reconnect host" TLV
//! clients follow from auth to BOS is itself just a new TCP connection), so
//! this module replaces the teacher's `transport.rs` entirely rather than
//! adapting it — noted in the design ledger as a dropped dependency
//! (`quinn`) rather than a generalized one.

use std::{collections::HashMap, sync::Arc, time::Duration};

use oscar_core::{
    auth::{AuthService, InMemoryCredentials},
    buddy::BuddyRegistry,
    chat::ChatRegistry,
    cookie::CookieBaker,
    rate_limit::ClassId,
    session_manager::SessionManager,
    ServiceId,
};
use tokio::{net::TcpListener, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ServerConfig,
    error::ServerError,
    router::Router,
    shells::{run_auth_shell, run_service_shell, ServiceExtras, ServiceShellConfig},
    system_env::SystemEnv,
};

/// Run every configured service listener until `cancel` fires.
///
/// # Errors
///
/// Returns [`ServerError::Transport`] if any of the six addresses fail to
/// bind.
pub async fn run_server(config: ServerConfig, cancel: CancellationToken) -> Result<(), ServerError> {
    let env = SystemEnv::new();
    let cookie_baker = Arc::new(CookieBaker::with_ttl(
        config.hmac_secret.clone().into_bytes(),
        config.cookie_ttl_secs,
        env.clone(),
    ));
    let sessions = Arc::new(SessionManager::new());
    let chat_rooms = Arc::new(ChatRegistry::new());
    let buddies = Arc::new(BuddyRegistry::new());
    let router = Arc::new(Router::new());
    let rate_classes = config.rate_class_params();

    let credentials = InMemoryCredentials::new();
    let auth = Arc::new(AuthService::new(
        CookieBaker::with_ttl(config.hmac_secret.clone().into_bytes(), config.cookie_ttl_secs, env.clone()),
        credentials,
        env.clone(),
    ));

    let auth_listener = TcpListener::bind(&config.auth_addr.bind)
        .await
        .map_err(|e| ServerError::Transport(format!("auth bind {}: {e}", config.auth_addr.bind)))?;
    let bos_listener = TcpListener::bind(&config.bos_addr.bind)
        .await
        .map_err(|e| ServerError::Transport(format!("bos bind {}: {e}", config.bos_addr.bind)))?;
    let chat_listener = TcpListener::bind(&config.chat_addr.bind)
        .await
        .map_err(|e| ServerError::Transport(format!("chat bind {}: {e}", config.chat_addr.bind)))?;
    let chat_nav_listener = TcpListener::bind(&config.chat_nav_addr.bind)
        .await
        .map_err(|e| ServerError::Transport(format!("chat-nav bind {}: {e}", config.chat_nav_addr.bind)))?;
    let alert_listener = TcpListener::bind(&config.alert_addr.bind)
        .await
        .map_err(|e| ServerError::Transport(format!("alert bind {}: {e}", config.alert_addr.bind)))?;
    let bart_listener = TcpListener::bind(&config.bart_addr.bind)
        .await
        .map_err(|e| ServerError::Transport(format!("bart bind {}: {e}", config.bart_addr.bind)))?;

    tracing::info!(
        auth = %config.auth_addr.bind, bos = %config.bos_addr.bind, chat = %config.chat_addr.bind,
        chat_nav = %config.chat_nav_addr.bind, alert = %config.alert_addr.bind, bart = %config.bart_addr.bind,
        "oscar-server listening"
    );

    let bos_advertise = config.bos_addr.advertise.clone();
    let bos_extras = ServiceExtras::Bos(buddies.clone());
    let chat_extras = ServiceExtras::Chat(chat_rooms.clone());

    let tasks: Arc<std::sync::Mutex<JoinSet<()>>> = Arc::new(std::sync::Mutex::new(JoinSet::new()));

    tokio::join!(
        accept_auth_loop(auth_listener, auth, bos_advertise, cancel.clone(), &tasks),
        accept_service_loop(bos_listener, ServiceId::Bos, &cookie_baker, &sessions, bos_extras, &router, &rate_classes, &env, &cancel, &tasks),
        accept_service_loop(chat_listener, ServiceId::Chat, &cookie_baker, &sessions, chat_extras.clone(), &router, &rate_classes, &env, &cancel, &tasks),
        accept_service_loop(chat_nav_listener, ServiceId::ChatNav, &cookie_baker, &sessions, chat_extras, &router, &rate_classes, &env, &cancel, &tasks),
        accept_service_loop(alert_listener, ServiceId::Alert, &cookie_baker, &sessions, ServiceExtras::None, &router, &rate_classes, &env, &cancel, &tasks),
        accept_service_loop(bart_listener, ServiceId::Bart, &cookie_baker, &sessions, ServiceExtras::None, &router, &rate_classes, &env, &cancel, &tasks),
    );

    let mut tasks = {
        let mut guard = tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::take(&mut *guard)
    };

    tracing::info!(pending = tasks.len(), "accept loops stopped, draining in-flight connections");
    let drain = tokio::time::timeout(Duration::from_secs(5), async {
        while tasks.join_next().await.is_some() {}
    });
    if drain.await.is_err() {
        tracing::warn!("shutdown grace period elapsed with connections still active");
    }

    Ok(())
}

async fn accept_auth_loop(
    listener: TcpListener,
    auth: Arc<AuthService<SystemEnv, InMemoryCredentials>>,
    bos_advertise: String,
    cancel: CancellationToken,
    tasks: &Arc<std::sync::Mutex<JoinSet<()>>>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let auth = auth.clone();
                        let bos_advertise = bos_advertise.clone();
                        let mut guard = tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                        guard.spawn(async move {
                            if let Err(err) = run_auth_shell(stream, auth, bos_advertise).await {
                                tracing::debug!(%peer, error = %err, "auth handshake failed");
                            }
                        });
                    }
                    Err(err) => tracing::warn!(error = %err, "auth accept failed"),
                }
            }
            () = cancel.cancelled() => return,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn accept_service_loop(
    listener: TcpListener,
    service: ServiceId,
    cookie_baker: &Arc<CookieBaker<SystemEnv>>,
    sessions: &Arc<SessionManager<SystemEnv>>,
    extras: ServiceExtras<SystemEnv>,
    router: &Arc<Router<SystemEnv>>,
    rate_classes: &HashMap<ClassId, oscar_core::rate_limit::RateClassParams>,
    env: &SystemEnv,
    cancel: &CancellationToken,
    tasks: &Arc<std::sync::Mutex<JoinSet<()>>>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let shell_config = ServiceShellConfig {
                            service,
                            cookie_baker: cookie_baker.clone(),
                            sessions: sessions.clone(),
                            extras: extras.clone(),
                            router: router.clone(),
                            rate_classes: rate_classes.clone(),
                            env: env.clone(),
                            cancel: cancel.clone(),
                        };
                        let mut guard = tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                        guard.spawn(async move {
                            if let Err(err) = run_service_shell(stream, shell_config).await {
                                tracing::debug!(%peer, ?service, error = %err, "service handshake or dispatch ended");
                            }
                        });
                    }
                    Err(err) => tracing::warn!(?service, error = %err, "accept failed"),
                }
            }
            () = cancel.cancelled() => return,
        }
    }
}
