//! ORVD Server - ground control relay for vehicles, mission senders and operators

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orvd_server::config::Config;
use orvd_server::pubsub::inbound;
use orvd_server::state::AppState;
use orvd_server::api;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("orvd_server=debug".parse()?))
        .init();

    tracing::info!("Starting ORVD Server...");

    let config = Config::from_env();
    let port = config.server_port;
    let state = AppState::build(config).await?;
    state.schedule_lock_pruning(60);

    // Inbound pub/sub traffic
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let topic_task = Arc::new(inbound::router()?).spawn(state.clone(), shutdown_rx)?;

    let app = api::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(());
    let _ = topic_task.await;

    Ok(())
}
