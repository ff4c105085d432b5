// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration
//!
//! Every option can be given as a flag or through the environment (a `.env`
//! file is loaded by the binaries before parsing).

use anyhow::{bail, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::ApiConfig;
use crate::detection::YoloParams;
use crate::vision::FetcherConfig;

/// OD/macular detection service
#[derive(Parser, Debug, Clone)]
#[command(name = "od-macular-detection")]
#[command(version, about = "Optic disc and macula detection over HTTP", long_about = None)]
pub struct ServiceConfig {
    /// Address the detection API listens on
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:7005")]
    pub api_addr: SocketAddr,

    /// Address the Prometheus exporter listens on
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8099")]
    pub metrics_addr: SocketAddr,

    /// YOLOv5 ONNX export
    #[arg(long, env = "MODEL_PATH", default_value = "./models/od-macular-yolov5.onnx")]
    pub model_path: PathBuf,

    /// One class name per line; falls back to the model's `names` metadata
    #[arg(long, env = "LABELS_PATH")]
    pub labels_path: Option<PathBuf>,

    #[arg(long, env = "MODEL_INPUT_SIZE", default_value_t = 640)]
    pub input_size: u32,

    #[arg(long, env = "CONF_THRESHOLD", default_value_t = 0.25)]
    pub conf_threshold: f32,

    #[arg(long, env = "IOU_THRESHOLD", default_value_t = 0.45)]
    pub iou_threshold: f32,

    #[arg(long, env = "MAX_DETECTIONS", default_value_t = 1000)]
    pub max_detections: usize,

    /// Whole-request timeout for image downloads
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    #[arg(long, env = "MAX_IMAGE_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_image_bytes: usize,

    /// Bound on decode + inference per request (unbounded if unset)
    #[arg(long, env = "INFERENCE_TIMEOUT_SECS")]
    pub inference_timeout_secs: Option<u64>,

    /// Answer errors with 200 OK instead of a 4xx/5xx status
    #[arg(long, env = "LEGACY_ERROR_STATUS", default_value_t = false)]
    pub legacy_error_status: bool,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.conf_threshold) {
            bail!(
                "conf_threshold must be within [0, 1], got {}",
                self.conf_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            bail!(
                "iou_threshold must be within [0, 1], got {}",
                self.iou_threshold
            );
        }
        if self.input_size == 0 || self.input_size % 32 != 0 {
            bail!(
                "input_size must be a positive multiple of 32, got {}",
                self.input_size
            );
        }
        if self.max_detections == 0 {
            bail!("max_detections must be greater than zero");
        }
        if self.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be greater than zero");
        }
        if self.max_image_bytes == 0 {
            bail!("max_image_bytes must be greater than zero");
        }
        if self.inference_timeout_secs == Some(0) {
            bail!("inference_timeout_secs must be greater than zero when set");
        }
        if self.api_addr == self.metrics_addr && self.api_addr.port() != 0 {
            bail!(
                "API and metrics exporter cannot share {}",
                self.api_addr
            );
        }
        Ok(())
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            listen_addr: self.api_addr.to_string(),
            legacy_error_status: self.legacy_error_status,
            inference_timeout: self.inference_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_bytes: self.max_image_bytes,
            ..FetcherConfig::default()
        }
    }

    pub fn yolo_params(&self) -> YoloParams {
        YoloParams {
            input_size: self.input_size,
            conf_threshold: self.conf_threshold,
            iou_threshold: self.iou_threshold,
            max_detections: self.max_detections,
        }
    }
}
