// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod detection;
pub mod monitoring;
pub mod version;
pub mod vision;

pub use api::{ApiConfig, ApiServer, AppState};
pub use config::ServiceConfig;
pub use detection::{DetectionRecord, Detector, YoloV5Detector};
pub use monitoring::DetectionMetrics;
