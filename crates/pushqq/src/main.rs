use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};

use pushqq_core::auth::{Authenticator, LoginClient, StdinPrompter};
use pushqq_core::config::Config;
use pushqq_core::gateway::observers::{DisconnectLogger, PingReply};
use pushqq_core::gateway::ObserverRegistry;
use pushqq_core::store::SessionStore;
use pushqq_http::{router::build_router, AppState};
use pushqq_ricq::RicqGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pushqq_core::logging::init("pushqq")?;

    let cfg = Arc::new(Config::load()?);
    let store = SessionStore::new(cfg.session_file.clone());

    let (gateway, events) = RicqGateway::connect(&cfg)
        .await
        .context("connect to qq server")?;

    // Login is strictly sequential: the listener only comes up once the
    // gateway is authenticated.
    let auth = Authenticator::new(
        gateway.clone(),
        store.clone(),
        Arc::new(StdinPrompter),
        &cfg,
    );
    auth.login().await.context("qq login failed")?;
    info!("login succeeded");

    let mut registry = ObserverRegistry::default();
    registry.register(Arc::new(PingReply));
    registry.register(Arc::new(DisconnectLogger));
    let _dispatch = gateway.spawn_dispatch(registry, events);

    let state = AppState::new(gateway.clone());
    let app = build_router(state);

    let listener = TcpListener::bind(("0.0.0.0", cfg.port))
        .await
        .with_context(|| format!("bind port {}", cfg.port))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown(gateway, store))
        .await?;

    Ok(())
}

/// Waits for a termination signal, then persists the session exactly once
/// before letting the server wind down.
async fn shutdown(gateway: Arc<RicqGateway>, store: SessionStore) {
    wait_for_signal().await;
    info!("shutting down");

    match gateway.credential().await {
        Ok(credential) => match store.save(&credential) {
            Ok(()) => info!("session saved to {}", store.path().display()),
            Err(e) => error!("session not saved: {e}"),
        },
        Err(e) => error!("session not serialized: {e}"),
    }

    gateway.shutdown().await;
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("ctrl-c handler failed: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("sigterm handler failed: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
