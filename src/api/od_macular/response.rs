// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection response types

use serde::{Deserialize, Serialize};

use crate::detection::DetectionRecord;

/// Successful response of `POST /od-macular-detection`
///
/// Key names are consumed by existing clients and must not change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResponse {
    /// `data:image/png;base64,...` of the source image with boxes drawn
    pub annotated_image: String,
    /// Detections in model output order
    pub od_macular: Vec<DetectionRecord>,
}

impl DetectionResponse {
    pub fn new(annotated_image: String, od_macular: Vec<DetectionRecord>) -> Self {
        Self {
            annotated_image,
            od_macular,
        }
    }
}
