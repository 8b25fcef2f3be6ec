//! Liveness endpoint so hosting platforms do not idle the process.

use std::net::SocketAddr;

use axum::{routing::get, Json, Router};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Alive {
    status: &'static str,
    message: &'static str,
}

async fn alive() -> Json<Alive> {
    Json(Alive {
        status: "ok",
        message: "Bot is alive",
    })
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/health", get(alive))
}

/// Serve until the process exits.
pub async fn serve(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "health endpoint listening");
    axum::serve(listener, app()).await?;
    Ok(())
}
