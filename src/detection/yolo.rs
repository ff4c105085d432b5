// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! YOLOv5 detector on ONNX Runtime
//!
//! Runs a YOLOv5 model exported with `export.py --include onnx`. The exported
//! graph takes a `[1, 3, S, S]` float tensor and returns raw predictions of
//! shape `[1, N, 5 + nc]` laid out as `cx, cy, w, h, objectness, class scores`.
//! Letterboxing, confidence filtering and NMS happen here.

use image::{imageops, imageops::FilterType, DynamicImage, Rgb, RgbImage};
use ndarray::{Array4, ArrayView2, Axis, Ix2};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::labels::{label_for, load_labels, parse_metadata_names};
use super::nms::non_max_suppression;
use super::{DetectionError, DetectionRecord, Detector};

/// Grey used by YOLOv5 for letterbox padding
const LETTERBOX_FILL: u8 = 114;

/// Tunables for YOLOv5 post-processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YoloParams {
    /// Square model input size (640 for the stock export)
    pub input_size: u32,
    /// Minimum `objectness * class score` kept
    pub conf_threshold: f32,
    /// IoU above which same-class boxes are suppressed
    pub iou_threshold: f32,
    /// Upper bound on returned detections
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 1000,
        }
    }
}

/// Geometry of a letterbox resize, needed to map boxes back
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub ratio: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub source_width: u32,
    pub source_height: u32,
}

impl Letterbox {
    pub fn new(source_width: u32, source_height: u32, input_size: u32) -> Self {
        let size = input_size as f32;
        let ratio = (size / source_width as f32).min(size / source_height as f32);
        let scaled_w = (source_width as f32 * ratio).round();
        let scaled_h = (source_height as f32 * ratio).round();
        Self {
            ratio,
            pad_x: ((size - scaled_w) / 2.0).floor(),
            pad_y: ((size - scaled_h) / 2.0).floor(),
            source_width,
            source_height,
        }
    }

    fn scaled_size(&self) -> (u32, u32) {
        (
            ((self.source_width as f32 * self.ratio).round() as u32).max(1),
            ((self.source_height as f32 * self.ratio).round() as u32).max(1),
        )
    }
}

/// Resize `image` into a padded `input_size` square and lay it out as NCHW
pub fn preprocess(image: &DynamicImage, input_size: u32) -> (Array4<f32>, Letterbox) {
    let rgb = image.to_rgb8();
    let letterbox = Letterbox::new(rgb.width(), rgb.height(), input_size);
    let (scaled_w, scaled_h) = letterbox.scaled_size();

    let resized = imageops::resize(&rgb, scaled_w, scaled_h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(input_size, input_size, Rgb([LETTERBOX_FILL; 3]));
    imageops::replace(
        &mut canvas,
        &resized,
        letterbox.pad_x as i64,
        letterbox.pad_y as i64,
    );

    let side = input_size as usize;
    let mut input = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        input[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
        input[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
        input[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
    }

    (input, letterbox)
}

/// Turn raw `[N, 5 + nc]` predictions into source-space detections
pub fn decode_predictions(
    predictions: ArrayView2<f32>,
    letterbox: &Letterbox,
    params: &YoloParams,
    labels: &[String],
) -> Result<Vec<DetectionRecord>, DetectionError> {
    let width = predictions.shape()[1];
    if width < 6 {
        return Err(DetectionError::OutputShape(predictions.shape().to_vec()));
    }

    let mut detections = Vec::new();
    for row in predictions.axis_iter(Axis(0)) {
        let objectness = row[4];
        if objectness < params.conf_threshold {
            continue;
        }

        let (class_id, class_score) = row
            .iter()
            .skip(5)
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, 0.0));

        let confidence = objectness * class_score;
        if confidence < params.conf_threshold {
            continue;
        }

        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        let record = DetectionRecord {
            xmin: (cx - w / 2.0 - letterbox.pad_x) / letterbox.ratio,
            ymin: (cy - h / 2.0 - letterbox.pad_y) / letterbox.ratio,
            xmax: (cx + w / 2.0 - letterbox.pad_x) / letterbox.ratio,
            ymax: (cy + h / 2.0 - letterbox.pad_y) / letterbox.ratio,
            confidence,
            class_id: class_id as u32,
            name: label_for(labels, class_id),
        }
        .clamp_to(letterbox.source_width, letterbox.source_height);

        detections.push(record);
    }

    non_max_suppression(&mut detections, params.iou_threshold);
    detections.truncate(params.max_detections);
    Ok(detections)
}

fn load_err<E: std::fmt::Display>(e: E) -> DetectionError {
    DetectionError::ModelLoad(e.to_string())
}

fn inference_err<E: std::fmt::Display>(e: E) -> DetectionError {
    DetectionError::Inference(e.to_string())
}

/// YOLOv5 model loaded into an ONNX Runtime session
pub struct YoloV5Detector {
    /// ONNX Runtime session (`run` needs exclusive access)
    session: Mutex<Session>,
    input_name: String,
    labels: Vec<String>,
    params: YoloParams,
    model_name: String,
}

impl std::fmt::Debug for YoloV5Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloV5Detector")
            .field("model_name", &self.model_name)
            .field("input_name", &self.input_name)
            .field("labels", &self.labels)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl YoloV5Detector {
    /// Load a model from disk
    ///
    /// Class names come from `labels_path` when given, otherwise from the
    /// `names` metadata entry of the ONNX file. Missing names fall back to
    /// `class{N}`.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        labels_path: Option<P>,
        params: YoloParams,
    ) -> Result<Self, DetectionError> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(DetectionError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        info!("🚀 Loading YOLOv5 model from {}", model_path.display());

        let session = match Self::build_session(model_path, true) {
            Ok(session) => {
                info!("✅ CUDA execution provider initialized");
                session
            }
            Err(e) => {
                warn!("⚠️  CUDA execution provider failed: {}", e);
                warn!("   Falling back to CPU execution provider");
                Self::build_session(model_path, false)?
            }
        };

        // YOLOv5 exports name their single input "images"
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());
        debug!("Model input: {}", input_name);

        let labels = match labels_path {
            Some(path) => load_labels(path)?,
            None => session
                .metadata()
                .ok()
                .and_then(|metadata| metadata.custom("names").ok().flatten())
                .and_then(|raw| parse_metadata_names(&raw))
                .unwrap_or_default(),
        };

        if labels.is_empty() {
            warn!("No class names found, detections will be labelled by index");
        } else {
            info!("Loaded {} class names: {:?}", labels.len(), labels);
        }

        let model_name = model_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "yolov5".to_string());

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            labels,
            params,
            model_name,
        })
    }

    fn build_session(model_path: &Path, cuda: bool) -> Result<Session, DetectionError> {
        let builder = Session::builder().map_err(load_err)?;
        let builder = if cuda {
            builder
                .with_execution_providers([CUDAExecutionProvider::default().build()])
                .map_err(load_err)?
        } else {
            builder
                .with_execution_providers([CPUExecutionProvider::default().build()])
                .map_err(load_err)?
        };

        builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_err)?
            .with_intra_threads(4)
            .map_err(load_err)?
            .commit_from_file(model_path)
            .map_err(load_err)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Detector for YoloV5Detector {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectionRecord>, DetectionError> {
        let (input, letterbox) = preprocess(image, self.params.input_size);
        let input = Value::from_array(input).map_err(inference_err)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| DetectionError::Inference("session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(inference_err)?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(inference_err)?;
        let shape = output.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(DetectionError::OutputShape(shape));
        }

        let predictions = output
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .map_err(|_| DetectionError::OutputShape(shape.clone()))?;

        let detections = decode_predictions(predictions, &letterbox, &self.params, &self.labels)?;
        debug!(
            "{} detections from {} candidates",
            detections.len(),
            shape[1]
        );
        Ok(detections)
    }
}
