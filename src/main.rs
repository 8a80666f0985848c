//! pitchlive-back binary entrypoint wiring the phase machine, SSE streams and storage.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use pitchlive_back::{
    config::AppConfig,
    dao::{
        phase_store::{PhaseStore, memory::MemoryPhaseStore},
        storage::StorageError,
    },
    routes,
    services::{snapshot_writer::spawn_snapshot_writer, storage_supervisor},
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    spawn_snapshot_writer(app_state.clone());
    spawn_storage(app_state.clone());

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the storage supervisor for the backend named by `STORE_BACKEND`.
fn spawn_storage(state: SharedState) {
    let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| default_backend().into());
    info!(backend = %backend, "selected storage backend");

    match backend.as_str() {
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            use pitchlive_back::dao::phase_store::mongodb::{MongoConfig, MongoPhaseStore};

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = MongoConfig::from_env().await?;
                let store = MongoPhaseStore::connect(config).await?;
                Ok::<Arc<dyn PhaseStore>, StorageError>(Arc::new(store))
            }));
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            use pitchlive_back::dao::phase_store::couchdb::{CouchConfig, CouchPhaseStore};

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = CouchConfig::from_env()?;
                let store = CouchPhaseStore::connect(config).await?;
                Ok::<Arc<dyn PhaseStore>, StorageError>(Arc::new(store))
            }));
        }
        other => {
            if other != "memory" {
                warn!(backend = other, "unknown storage backend; keeping state in memory");
            }
            let store = MemoryPhaseStore::new();
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<Arc<dyn PhaseStore>, StorageError>(Arc::new(store)) }
            }));
        }
    }
}

fn default_backend() -> &'static str {
    if cfg!(feature = "mongo-store") {
        "mongo"
    } else if cfg!(feature = "couch-store") {
        "couch"
    } else {
        "memory"
    }
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

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}
