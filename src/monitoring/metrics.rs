// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/monitoring/metrics.rs - Request metrics for the detection endpoint

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Label naming the API route on every series
pub const API_LABEL: &str = "api";

pub const REQUEST_TOTAL: &str = "yolov5_request_total";
pub const REQUEST_SUCCESS_TOTAL: &str = "yolov5_request_success_total";
pub const REQUEST_ERROR_TOTAL: &str = "yolov5_request_error_total";
pub const RESPONSE_LATENCY_SECONDS: &str = "yolov5_response_latency_seconds";

/// Inference takes seconds, so buckets stretch to a minute
const LATENCY_BUCKETS: &[f64] = &[
    0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Counters and latency histogram for detection requests
///
/// Owns its own registry rather than the process-global default one, so it
/// can be created per test and injected into the handlers and the exporter.
/// Every series carries the `api` label. All updates are atomic.
#[derive(Clone)]
pub struct DetectionMetrics {
    registry: Registry,
    requests: IntCounterVec,
    successes: IntCounterVec,
    errors: IntCounterVec,
    latency: HistogramVec,
}

impl std::fmt::Debug for DetectionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionMetrics").finish_non_exhaustive()
    }
}

impl DetectionMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new(REQUEST_TOTAL, "Total number of YOLOv5 requests"),
            &[API_LABEL],
        )?;
        let successes = IntCounterVec::new(
            Opts::new(REQUEST_SUCCESS_TOTAL, "Count of successful YOLOv5 requests"),
            &[API_LABEL],
        )?;
        let errors = IntCounterVec::new(
            Opts::new(REQUEST_ERROR_TOTAL, "Count of failed YOLOv5 requests"),
            &[API_LABEL],
        )?;
        let latency = HistogramVec::new(
            HistogramOpts::new(RESPONSE_LATENCY_SECONDS, "YOLOv5 response latency in seconds")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &[API_LABEL],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(successes.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(latency.clone()))?;

        Ok(Self {
            registry,
            requests,
            successes,
            errors,
            latency,
        })
    }

    /// Count an attempt, whatever its outcome
    pub fn record_request(&self, route: &str) {
        self.requests.with_label_values(&[route]).inc();
    }

    /// Count a success and observe its latency
    pub fn record_success(&self, route: &str, elapsed: Duration) {
        self.successes.with_label_values(&[route]).inc();
        self.latency
            .with_label_values(&[route])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_error(&self, route: &str) {
        self.errors.with_label_values(&[route]).inc();
    }

    pub fn total(&self, route: &str) -> u64 {
        self.requests.with_label_values(&[route]).get()
    }

    pub fn successes(&self, route: &str) -> u64 {
        self.successes.with_label_values(&[route]).get()
    }

    pub fn errors(&self, route: &str) -> u64 {
        self.errors.with_label_values(&[route]).get()
    }

    /// Number of latency observations
    pub fn latency_count(&self, route: &str) -> u64 {
        self.latency.with_label_values(&[route]).get_sample_count()
    }

    /// Sum of observed latencies in seconds
    pub fn latency_sum(&self, route: &str) -> f64 {
        self.latency.with_label_values(&[route]).get_sample_sum()
    }

    /// Render all series in the Prometheus text exposition format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
