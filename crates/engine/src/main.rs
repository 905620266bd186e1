//! Battlegrid Engine - Main entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use battlegrid_engine::api;
use battlegrid_engine::app::{App, EngineConfig};
use battlegrid_engine::ports::{DevTokenVerifier, InMemoryCharacterStore, StaticCatalog, SystemDice};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "battlegrid_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Battlegrid Engine");

    let config = EngineConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        grace_secs = config.room_grace.as_secs(),
        "Configuration loaded"
    );

    let app = Arc::new(App::new(
        config,
        Arc::new(InMemoryCharacterStore::new()),
        Arc::new(StaticCatalog),
        Arc::new(DevTokenVerifier),
        Arc::new(SystemDice),
    ));

    // Sweep rooms whose grace period expired. Emptiness is re-checked right
    // before removal so a reconnect during the sweep wins.
    let sweeper = app.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let grace = sweeper.config.room_grace;
            let mut removed = 0usize;
            for room_id in sweeper.rooms.idle_rooms(grace) {
                if sweeper.connections.room_is_empty(room_id).await
                    && sweeper.rooms.remove_if_expired(room_id, grace)
                {
                    removed += 1;
                }
            }
            if removed > 0 {
                tracing::info!(removed, "Swept idle rooms");
            }
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .merge(api::http::routes())
        .route("/ws/rooms/{room_id}", get(api::websocket::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app.clone());

    let addr: SocketAddr = format!("{}:{}", app.config.host, app.config.port).parse()?;
    tracing::info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
