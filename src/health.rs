//! Liveness endpoint for external health checks.

use anyhow::Result;
use axum::{routing::get, Router};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;
use tracing::info;

pub const RUNNING: &str = "Bot is running!";

pub fn router() -> Router {
    Router::new().route("/", get(root))
}

async fn root() -> &'static str {
    RUNNING
}

/// Serve the liveness route on all interfaces until the process exits
pub async fn serve(port: u16) -> Result<()> {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await?;
    info!("Liveness endpoint listening at {}", listener.local_addr()?);
    axum::serve(listener, router()).await?;
    Ok(())
}
