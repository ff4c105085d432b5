// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection request parameters and validation

use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;

/// Longest accepted `image_url`
const MAX_URL_LENGTH: usize = 2048;

/// Query string of `POST /od-macular-detection`
///
/// The request body is ignored; everything arrives in the query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionQuery {
    /// URL of the image to process
    #[serde(default)]
    pub image_url: Option<String>,
}

impl DetectionQuery {
    pub fn new(image_url: impl Into<String>) -> Self {
        Self {
            image_url: Some(image_url.into()),
        }
    }

    /// Validate and return the trimmed image URL
    pub fn validate(&self) -> Result<String, ApiError> {
        let url = self
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ApiError::ValidationError {
                field: "image_url".to_string(),
                message: "image_url is required".to_string(),
            })?;

        if url.len() > MAX_URL_LENGTH {
            return Err(ApiError::ValidationError {
                field: "image_url".to_string(),
                message: format!("image_url exceeds maximum length of {}", MAX_URL_LENGTH),
            });
        }

        Ok(url.to_string())
    }
}
