mod config;
mod push;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use rbd_api::auth::{AppState, AppStateInner};
use rbd_core::store::PushDispatcher;
use rbd_core::{AuthService, CooldownLedger, FriendService, SessionStore, Stores, TriggerEngine};
use rbd_db::Database;

use crate::config::Config;
use crate::push::{HttpPushDispatcher, LogDispatcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rbd=debug,rbd_api=debug,rbd_core=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);
    let stores = Stores::shared(db);

    let dispatcher: Arc<dyn PushDispatcher> = match &config.push_url {
        Some(url) => {
            info!("Push gateway: {}", url);
            Arc::new(HttpPushDispatcher::new(url.clone(), config.push_key.clone()))
        }
        None => {
            info!("RBD_PUSH_URL not set, notifications will only be logged");
            Arc::new(LogDispatcher)
        }
    };

    let sessions = SessionStore::new(config.sessions.clone());
    let ledger = CooldownLedger::new(stores.cooldowns.clone());

    // Background sweeps
    let session_sweeper = sessions.start_sweeper();
    let cooldown_sweeper = ledger.start_sweeper(config.cooldown_sweep_interval);

    let state: AppState = Arc::new(AppStateInner {
        auth: AuthService::new(stores.users.clone(), sessions),
        friends: FriendService::new(stores.clone(), ledger.clone(), config.friend_policy.clone()),
        engine: TriggerEngine::new(stores, ledger, dispatcher),
    });

    let app = rbd_api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Return By Death server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    session_sweeper.shutdown().await;
    cooldown_sweeper.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
