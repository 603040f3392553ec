// ============================
// crates/backend-bin/src/main.rs
// ============================
//! Termchat relay server binary.
use backend_lib::{config::Settings, storage::SqliteStore, ws_router, AppState};
use std::fs;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();

    info!("starting termchat server...");

    let settings = match std::env::var("TERMCHAT_CONFIG") {
        Ok(path) => Settings::load_from(&path)?,
        Err(_) => Settings::load()?,
    };
    debug!("configuration loaded: {:?}", settings);

    let db_path = settings.database.path.clone();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let store = SqliteStore::open(&db_path).await?;
    store.migrate().await?;
    info!("store initialized at {}", db_path.display());

    let addr = settings.listen_addr();
    let state = AppState::new(store, settings);
    let app = ws_router::create_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("server listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
