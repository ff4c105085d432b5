// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/monitoring/mod.rs - Main monitoring module

pub mod exporter;
pub mod metrics;

// Re-export main types
pub use exporter::{metrics_router, start_metrics_server};
pub use metrics::{
    DetectionMetrics, API_LABEL, REQUEST_ERROR_TOTAL, REQUEST_SUCCESS_TOTAL, REQUEST_TOTAL,
    RESPONSE_LATENCY_SECONDS,
};
