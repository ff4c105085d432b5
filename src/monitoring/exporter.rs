// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prometheus scrape endpoint on its own port

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::metrics::DetectionMetrics;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

pub fn metrics_router(metrics: Arc<DetectionMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<Arc<DetectionMetrics>>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Bind `addr` and serve `/metrics` until `shutdown` resolves
///
/// Returns the bound address (useful with port 0) and the server task.
pub async fn start_metrics_server<F>(
    addr: SocketAddr,
    metrics: Arc<DetectionMetrics>,
    shutdown: F,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let app = metrics_router(metrics);

    info!("📊 Metrics exporter listening on {}", local_addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("Metrics exporter stopped: {}", e);
        }
    });

    Ok((local_addr, handle))
}
