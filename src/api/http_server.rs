// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::od_macular::od_macular_detection_handler;
use super::server::ApiConfig;
use crate::detection::Detector;
use crate::monitoring::DetectionMetrics;
use crate::vision::ImageFetcher;

/// Route served by the detection endpoint, also the `api` metrics label
pub const OD_MACULAR_ROUTE: &str = "/od-macular-detection";

/// Shared handler state
///
/// The detector and fetcher are read-only after startup. The metrics are the
/// only state mutated across requests.
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<dyn Detector>,
    pub fetcher: Arc<ImageFetcher>,
    pub metrics: Arc<DetectionMetrics>,
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(
        detector: Arc<dyn Detector>,
        fetcher: Arc<ImageFetcher>,
        metrics: Arc<DetectionMetrics>,
        config: ApiConfig,
    ) -> Self {
        Self {
            detector,
            fetcher,
            metrics,
            config,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub detector: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(OD_MACULAR_ROUTE, post(od_macular_detection_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::version::VERSION.to_string(),
        detector: state.detector.name().to_string(),
    })
}
