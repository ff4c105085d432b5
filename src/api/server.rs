// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::http_server::{create_router, AppState};

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub listen_addr: String,
    /// Answer every error with 200 OK, as older clients expect
    pub legacy_error_status: bool,
    /// Upper bound on decode + inference + encode; unbounded when `None`
    pub inference_timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:7005".to_string(),
            legacy_error_status: false,
            inference_timeout: None,
        }
    }
}

pub struct ApiServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ApiServer {
    /// Bind `state.config.listen_addr` and serve the API in the background
    pub async fn start(state: AppState) -> Result<Self> {
        let addr: SocketAddr = state
            .config
            .listen_addr
            .parse()
            .with_context(|| format!("invalid listen address {}", state.config.listen_addr))?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind API listener on {}", addr))?;
        let actual_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = create_router(state);

        let handle = tokio::spawn(async move {
            let serve_future = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });

            if let Err(e) = serve_future.await {
                error!("API server stopped: {}", e);
            }
        });

        info!("🌐 API server listening on {}", actual_addr);

        Ok(Self {
            addr: actual_addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}
