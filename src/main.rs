//! Spin draw backend entrypoint wiring REST, SSE, the draw ticker and storage.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spin_draw_back::{
    config::AppConfig,
    dao::draw_store::memory::MemoryStore,
    routes,
    services::draw_ticker,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    start_storage(&app_state).await?;
    tokio::spawn(draw_ticker::run(app_state.clone()));

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

/// Install the storage backend selected by `STORE_BACKEND` (`mongo` by default).
async fn start_storage(state: &SharedState) -> anyhow::Result<()> {
    let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| default_backend().into());
    match backend.as_str() {
        "memory" => {
            info!("using in-memory store; data is lost on restart");
            state.install_store(Arc::new(MemoryStore::new())).await;
            Ok(())
        }
        "mongo" => start_mongo(state).await,
        other => bail!("unknown STORE_BACKEND `{other}` (expected `mongo` or `memory`)"),
    }
}

#[cfg(feature = "mongo-store")]
fn default_backend() -> &'static str {
    "mongo"
}

#[cfg(not(feature = "mongo-store"))]
fn default_backend() -> &'static str {
    "memory"
}

/// Spawn the supervisor that connects to MongoDB and keeps degraded mode in sync.
#[cfg(feature = "mongo-store")]
async fn start_mongo(state: &SharedState) -> anyhow::Result<()> {
    use spin_draw_back::{
        dao::{
            draw_store::{
                SpinStore,
                mongodb::{MongoConfig, MongoSpinStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    let config = MongoConfig::from_env()
        .await
        .context("loading MongoDB configuration")?;
    tokio::spawn(storage_supervisor::run(state.clone(), move || {
        let config = config.clone();
        async move {
            MongoSpinStore::connect(config)
                .await
                .map(|store| Arc::new(store) as Arc<dyn SpinStore>)
                .map_err(StorageError::from)
        }
    }));
    Ok(())
}

#[cfg(not(feature = "mongo-store"))]
async fn start_mongo(_state: &SharedState) -> anyhow::Result<()> {
    bail!("this build was compiled without the `mongo-store` feature")
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
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
