// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object detection capability
//!
//! The detector itself is opaque to the rest of the service: given an image it
//! produces bounding boxes with labels and scores. The `Detector` trait is the
//! seam between the HTTP pipeline and whatever model backs it, so the pipeline
//! can run against a fake in tests and against ONNX Runtime in production.

pub mod labels;
pub mod nms;
pub mod render;
pub mod yolo;

use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use labels::load_labels;
pub use yolo::{YoloParams, YoloV5Detector};

/// Errors raised by a detector while loading or running a model
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected model output shape: {0:?}")]
    OutputShape(Vec<usize>),

    #[error("Invalid labels file: {0}")]
    Labels(String),
}

/// One detected object
///
/// Field order is part of the public response format and must stay
/// `xmin, ymin, xmax, ymax, confidence, class, name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    /// Confidence score (0.0-1.0)
    pub confidence: f32,
    /// Class index in the model's label table
    #[serde(rename = "class")]
    pub class_id: u32,
    /// Class label
    pub name: String,
}

impl DetectionRecord {
    pub fn width(&self) -> f32 {
        (self.xmax - self.xmin).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.ymax - self.ymin).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &DetectionRecord) -> f32 {
        let ix = (self.xmax.min(other.xmax) - self.xmin.max(other.xmin)).max(0.0);
        let iy = (self.ymax.min(other.ymax) - self.ymin.max(other.ymin)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Clamp the box into `[0, width] x [0, height]`
    pub fn clamp_to(mut self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        self.xmin = self.xmin.clamp(0.0, w);
        self.xmax = self.xmax.clamp(0.0, w);
        self.ymin = self.ymin.clamp(0.0, h);
        self.ymax = self.ymax.clamp(0.0, h);
        self
    }
}

/// Result of running a detector over one image
///
/// Owns the rendered copy of the image; both fields are dropped once the
/// response has been encoded.
#[derive(Debug, Clone)]
pub struct InferenceResult {
    pub rendered: RgbImage,
    pub detections: Vec<DetectionRecord>,
}

/// A pretrained detection model
///
/// Implementations are loaded once at startup and shared read-only across
/// requests, hence `Send + Sync`. Calls are synchronous and may take seconds;
/// callers run them off the async runtime.
pub trait Detector: Send + Sync {
    /// Model name used in logs and the health response
    fn name(&self) -> &str;

    /// Run the model over `image`, returning detections in model output order
    fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectionRecord>, DetectionError>;

    /// Run the model and render the detections onto a copy of `image`
    fn infer(&self, image: &DynamicImage) -> Result<InferenceResult, DetectionError> {
        let detections = self.detect(image)?;
        let rendered = render::draw_detections(image, &detections);
        Ok(InferenceResult {
            rendered,
            detections,
        })
    }
}
