// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::detection::DetectionError;
use crate::vision::{FetchError, ImageError};

/// Error body returned by the detection endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    InvalidRequest(String),
    ValidationError { field: String, message: String },
    /// Upstream image server unreachable or answered non-2xx
    FetchFailed(String),
    PayloadTooLarge(String),
    /// Bytes fetched but not a decodable image
    DecodeFailed(String),
    InferenceFailed(String),
    InternalError(String),
    Timeout(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_) | ApiError::ValidationError { .. } => 400,
            ApiError::FetchFailed(_) => 502,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::DecodeFailed(_) => 422,
            ApiError::InferenceFailed(_) | ApiError::InternalError(_) => 500,
            ApiError::Timeout(_) => 504,
        }
    }

    /// Short machine-readable kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::ValidationError { .. } => "validation_error",
            ApiError::FetchFailed(_) => "fetch_failed",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::DecodeFailed(_) => "decode_failed",
            ApiError::InferenceFailed(_) => "inference_failed",
            ApiError::InternalError(_) => "internal_error",
            ApiError::Timeout(_) => "timeout",
        }
    }

    /// Build the HTTP response; `legacy_status` answers every error with 200
    pub fn into_response_with(self, legacy_status: bool) -> Response {
        let status = if legacy_status {
            StatusCode::OK
        } else {
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        };
        (status, Json(self.to_response())).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::FetchFailed(msg) => write!(f, "Failed to retrieve image from URL: {}", msg),
            ApiError::PayloadTooLarge(msg) => write!(f, "Image too large: {}", msg),
            ApiError::DecodeFailed(msg) => write!(f, "Failed to decode image: {}", msg),
            ApiError::InferenceFailed(msg) => write!(f, "Detection failed: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Timeout(msg) => write!(f, "Request timed out: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_response_with(false)
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::InvalidUrl { .. } => ApiError::ValidationError {
                field: "image_url".to_string(),
                message: e.to_string(),
            },
            FetchError::Timeout { .. } => ApiError::Timeout(e.to_string()),
            FetchError::TooLarge { .. } => ApiError::PayloadTooLarge(e.to_string()),
            FetchError::Client(_) => ApiError::InternalError(e.to_string()),
            FetchError::Request { .. } | FetchError::Status { .. } => {
                ApiError::FetchFailed(e.to_string())
            }
        }
    }
}

impl From<ImageError> for ApiError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::TooLarge(..) => ApiError::PayloadTooLarge(e.to_string()),
            ImageError::EncodeFailed(_) => ApiError::InternalError(e.to_string()),
            ImageError::EmptyData | ImageError::UnsupportedFormat | ImageError::DecodeFailed(_) => {
                ApiError::DecodeFailed(e.to_string())
            }
        }
    }
}

impl From<DetectionError> for ApiError {
    fn from(e: DetectionError) -> Self {
        ApiError::InferenceFailed(e.to_string())
    }
}
