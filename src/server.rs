//! # HTTP Server
//!
//! Serves the controller's operational endpoints:
//! - `/metrics` - Prometheus metrics in text exposition format
//! - `/healthz` - Liveness probe, always 200 while the process runs
//! - `/readyz` - Readiness probe, 200 once the controller watch is running
//!
//! The listen port comes from `METRICS_PORT` (default 8080).

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, TextEncoder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared readiness flag flipped by main once the watch loop is up
#[derive(Debug)]
pub struct ServerState {
    pub is_ready: Arc<AtomicBool>,
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(|| async { StatusCode::OK }))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(port: u16, state: Arc<ServerState>) -> Result<(), anyhow::Error> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {addr}");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn metrics() -> impl IntoResponse {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    match encoder.encode(&crate::observability::metrics::gather(), &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            error!("Failed to encode metrics: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {e}").into_bytes(),
            )
        }
    }
}

async fn readyz(State(state): State<Arc<ServerState>>) -> StatusCode {
    if state.is_ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state(ready: bool) -> Arc<ServerState> {
        Arc::new(ServerState {
            is_ready: Arc::new(AtomicBool::new(ready)),
        })
    }

    async fn get_status(router: Router, path: &str) -> StatusCode {
        let response = router
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn test_healthz_is_always_ok() {
        assert_eq!(get_status(router(state(false)), "/healthz").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readyz_follows_the_readiness_flag() {
        assert_eq!(
            get_status(router(state(false)), "/readyz").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(get_status(router(state(true)), "/readyz").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_renders_text_exposition() {
        assert_eq!(get_status(router(state(true)), "/metrics").await, StatusCode::OK);
    }
}
