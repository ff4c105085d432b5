// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OD/macular detection endpoint handler

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::request::DetectionQuery;
use super::response::DetectionResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::{AppState, OD_MACULAR_ROUTE};
use crate::monitoring::API_LABEL;
use crate::vision::{decode_image_bytes, encode_png_data_uri};

/// POST /od-macular-detection - Detect optic disc and macula in an image
///
/// # Request
/// - `image_url` (query): URL of the image to process. The body is ignored.
///
/// # Response
/// - `annotated_image`: PNG data URI with detection boxes drawn
/// - `od_macular`: detections as `{xmin, ymin, xmax, ymax, confidence, class, name}`
///
/// # Errors
/// Always `{"error": "..."}`:
/// - 400 Bad Request: missing or invalid `image_url`, or a malformed query
///   string such as a repeated `image_url`
/// - 413 Payload Too Large: image over the size limit
/// - 422 Unprocessable Entity: fetched bytes are not a decodable image
/// - 500 Internal Server Error: detection or encoding failed
/// - 502 Bad Gateway: image server unreachable or answered non-2xx
/// - 504 Gateway Timeout: fetch or inference timed out
///
/// With `legacy_error_status` every error is returned with 200.
///
/// Every call counts once towards the request total and once towards either
/// the success or the error counter. Latency is observed for successes only.
pub async fn od_macular_detection_handler(
    State(state): State<AppState>,
    query: Result<Query<DetectionQuery>, QueryRejection>,
) -> Response {
    let start = Instant::now();
    let route = OD_MACULAR_ROUTE;

    state.metrics.record_request(route);

    let outcome = match query {
        Ok(Query(query)) => run_pipeline(&state, query).await,
        Err(rejection) => Err(ApiError::InvalidRequest(rejection.body_text())),
    };

    match outcome {
        Ok(response) => {
            debug!("Incrementing success counter for {}={}", API_LABEL, route);
            let elapsed = start.elapsed();
            debug!(
                "Recording response time for {}={}: {:.3}s",
                API_LABEL,
                route,
                elapsed.as_secs_f64()
            );
            state.metrics.record_success(route, elapsed);

            info!(
                "Detection complete: {} objects in {}ms",
                response.od_macular.len(),
                elapsed.as_millis()
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            match &e {
                ApiError::FetchFailed(_) | ApiError::Timeout(_) => {
                    error!("Failed to retrieve image: {}", e)
                }
                ApiError::InferenceFailed(_) | ApiError::InternalError(_) => {
                    error!("Detection request failed ({}): {}", e.kind(), e)
                }
                _ => warn!("Detection request rejected ({}): {}", e.kind(), e),
            }
            state.metrics.record_error(route);
            e.into_response_with(state.config.legacy_error_status)
        }
    }
}

/// Fetch, decode, detect and encode one image
///
/// Decoding, inference and PNG encoding are CPU-bound and run on the blocking
/// pool. A panic there is reported as a detection failure.
pub async fn run_pipeline(
    state: &AppState,
    query: DetectionQuery,
) -> Result<DetectionResponse, ApiError> {
    let image_url = query.validate()?;

    debug!("Fetching image from {}", image_url);
    let fetched = state.fetcher.fetch(&image_url).await?;
    debug!(
        "Fetched {} bytes, content type {}",
        fetched.bytes.len(),
        fetched.content_type
    );

    let detector = state.detector.clone();
    let max_bytes = state.fetcher.config().max_bytes;
    let task = tokio::task::spawn_blocking(move || -> Result<DetectionResponse, ApiError> {
        let (image, info) =
            decode_image_bytes(&fetched.bytes, Some(&fetched.content_type), max_bytes)?;
        debug!(
            "Decoded image: {}x{} {:?}, {} bytes",
            info.width, info.height, info.format, info.size_bytes
        );

        let result = detector.infer(&image)?;
        debug!(
            "{} returned {} detections",
            detector.name(),
            result.detections.len()
        );

        let annotated_image = encode_png_data_uri(&result.rendered)?;
        Ok(DetectionResponse::new(annotated_image, result.detections))
    });

    let joined = match state.config.inference_timeout {
        Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| {
            ApiError::Timeout(format!("detection exceeded {}s", limit.as_secs_f64()))
        })?,
        None => task.await,
    };

    joined.map_err(|e| {
        if e.is_panic() {
            ApiError::InferenceFailed("detector panicked".to_string())
        } else {
            ApiError::InternalError(format!("detection task cancelled: {}", e))
        }
    })?
}
