//! Wikirace backend binary entrypoint wiring the REST, WebSocket and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, anyhow};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use config::AppConfig;
use dao::keyed_store::{FsKeyedStore, KeyedStore, MemoryKeyedStore};
use services::{page_token::load_or_create_key, session::SessionKeys};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let page_key = load_or_create_key(config.key_file()).context("loading page token key")?;
    let sessions = SessionKeys::derive(&page_key)
        .map_err(|err| anyhow!("deriving session key: {err}"))?;

    let store: Arc<dyn KeyedStore> = if env::args().any(|arg| arg == "--memory") {
        warn!("running with in-memory game storage; games are lost on exit");
        Arc::new(MemoryKeyedStore::new())
    } else {
        let store = FsKeyedStore::open(config.data_dir())
            .await
            .with_context(|| format!("opening game directory {}", config.data_dir().display()))?;
        info!(path = %store.root().display(), "storing games on disk");
        Arc::new(store)
    };

    let app_state = AppState::new(config, store, &page_key, sessions);
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
