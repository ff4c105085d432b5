// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use od_macular_detection::{
    api::{ApiServer, AppState},
    config::ServiceConfig,
    detection::{Detector, YoloV5Detector},
    monitoring::{start_metrics_server, DetectionMetrics},
    vision::ImageFetcher,
};
use std::{env, sync::Arc};
use tokio::{signal, sync::oneshot};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting OD/Macular Detection service...\n");
    println!("📦 {}", od_macular_detection::version::get_version_string());
    println!("🔖 Build tag: {}", od_macular_detection::version::VERSION);
    println!();

    let config = ServiceConfig::parse();
    config.validate().context("invalid configuration")?;

    // The model is loaded once; a missing or broken model stops startup
    println!("🧠 Loading detection model...");
    let detector = YoloV5Detector::load(
        config.model_path.clone(),
        config.labels_path.clone(),
        config.yolo_params(),
    )
    .with_context(|| format!("failed to load model {}", config.model_path.display()))?;
    println!(
        "✅ {} loaded with {} classes",
        detector.name(),
        detector.labels().len()
    );
    let detector: Arc<dyn Detector> = Arc::new(detector);

    let metrics = Arc::new(DetectionMetrics::new().context("failed to register metrics")?);

    let (metrics_shutdown_tx, metrics_shutdown_rx) = oneshot::channel::<()>();
    let (metrics_addr, metrics_handle) =
        start_metrics_server(config.metrics_addr, metrics.clone(), async move {
            let _ = metrics_shutdown_rx.await;
        })
        .await
        .context("failed to start metrics exporter")?;

    let fetcher = Arc::new(ImageFetcher::new(config.fetcher_config())?);
    let state = AppState::new(detector, fetcher, metrics, config.api_config());
    let server = ApiServer::start(state).await?;

    println!("\n🎉 OD/Macular Detection service is running!");
    println!("   API:     http://{}/od-macular-detection", server.local_addr());
    println!("   Metrics: http://{}/metrics", metrics_addr);
    println!("\nPress Ctrl+C to shutdown...");

    // Wait for shutdown signal
    signal::ctrl_c().await?;

    info!("Shutting down...");
    server.shutdown().await;
    let _ = metrics_shutdown_tx.send(());
    let _ = metrics_handle.await;
    println!("👋 Shutdown complete");

    Ok(())
}
