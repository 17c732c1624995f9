//! Keep-alive HTTP server
//!
//! Minimal liveness endpoint for hosting platforms that probe the process
//! (and put it to sleep when nothing answers). Any GET or HEAD path gets a
//! 200 with a fixed body; there is nothing else to expose here.

use axum::{http::StatusCode, routing::get, Router};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const BODY: &str = "Bot is running!";

/// Build the liveness router: every path answers 200
pub fn router() -> Router {
    Router::new()
        .route("/", get(probe))
        .fallback(probe)
        .layer(TraceLayer::new_for_http())
}

async fn probe() -> (StatusCode, &'static str) {
    (StatusCode::OK, BODY)
}

/// Run the keep-alive server until the process exits. A bind failure is
/// logged and swallowed so the bot keeps running without the probe.
pub async fn serve(port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Keep-alive server failed to bind {}: {}", addr, e);
            return;
        }
    };
    info!("Keep-alive server started on port {}", port);
    if let Err(e) = axum::serve(listener, router()).await {
        error!("Keep-alive server error: {}", e);
    }
}

/// Spawn the keep-alive server on a background task
pub fn spawn(port: u16) -> tokio::task::JoinHandle<()> {
    tokio::spawn(serve(port))
}
