//! HTTP API server
//!
//! Thin axum layer over the engine: enforcement, policy listing and reload,
//! audit queries, and compliance reporting. All domain logic lives below;
//! handlers translate between JSON DTOs and engine calls.

pub mod handler;

pub use handler::{api_router, AppState};

use crate::error::Result;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Bind and serve the API until the process is signalled
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let router = api_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install shutdown handler: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
