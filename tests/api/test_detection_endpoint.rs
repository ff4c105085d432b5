// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Success path of POST /od-macular-detection
//!
//! The upstream image server is a local axum router and the detector is a
//! fake, so these run without a model file or network access.

use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD, Engine};
use od_macular_detection::{
    api::ApiConfig,
    vision::{image_utils::MAX_IMAGE_SIZE, FetcherConfig},
};
use std::sync::Arc;
use std::time::Duration;

use crate::support::{
    noise_png, post_detection, post_detection_raw, router_with, router_with_fetcher,
    spawn_upstream, BrightSpotDetector, NOISE_SIDE, ROUTE,
};

const DATA_URI_PREFIX: &str = "data:image/png;base64,";

#[tokio::test]
async fn test_detects_single_object_in_512_image() {
    let upstream = spawn_upstream().await;
    let (app, state) = router_with(Arc::new(BrightSpotDetector), ApiConfig::default());

    let url = format!("http://{}/fundus.png", upstream);
    let (status, body) = post_detection(app, Some(&url)).await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    let records = body["od_macular"].as_array().unwrap();
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert!(record["confidence"].as_f64().unwrap() > 0.0);
    for key in ["xmin", "ymin", "xmax", "ymax"] {
        let value = record[key].as_f64().unwrap();
        assert!((0.0..=512.0).contains(&value), "{} = {}", key, value);
    }
    assert_eq!(record["class"], 0);
    assert_eq!(record["name"], "optic_disc");

    assert_eq!(state.metrics.total(ROUTE), 1);
    assert_eq!(state.metrics.successes(ROUTE), 1);
    assert_eq!(state.metrics.errors(ROUTE), 0);
    assert_eq!(state.metrics.latency_count(ROUTE), 1);
    assert!(state.metrics.latency_sum(ROUTE) >= 0.0);
}

#[tokio::test]
async fn test_annotated_image_is_png_data_uri_of_same_size() {
    let upstream = spawn_upstream().await;
    let (app, _) = router_with(Arc::new(BrightSpotDetector), ApiConfig::default());

    let url = format!("http://{}/fundus.png", upstream);
    let (status, body) = post_detection(app, Some(&url)).await;
    assert_eq!(status, StatusCode::OK);

    let uri = body["annotated_image"].as_str().unwrap();
    assert!(uri.starts_with(DATA_URI_PREFIX));

    let png = STANDARD.decode(&uri[DATA_URI_PREFIX.len()..]).unwrap();
    let annotated = image::load_from_memory(&png).unwrap();
    assert_eq!((annotated.width(), annotated.height()), (512, 512));

    // Box edge drawn on the left side of the disc
    let rgb = annotated.to_rgb8();
    let xmin = body["od_macular"][0]["xmin"].as_f64().unwrap() as u32;
    let ymid = 200;
    assert_eq!(rgb.get_pixel(xmin, ymid).0, [255, 56, 56]);
}

#[tokio::test]
async fn test_record_keys_in_order() {
    let upstream = spawn_upstream().await;
    let (app, _) = router_with(Arc::new(BrightSpotDetector), ApiConfig::default());

    let url = format!("http://{}/fundus.png", upstream);
    let (status, text) = post_detection_raw(app, Some(&url)).await;
    assert_eq!(status, StatusCode::OK);

    let records = &text[text.find("\"od_macular\"").unwrap()..];
    let positions: Vec<usize> = ["xmin", "ymin", "xmax", "ymax", "confidence", "class", "name"]
        .iter()
        .map(|key| records.find(&format!("\"{}\":", key)).unwrap())
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "{}", records);

    let body: serde_json::Value = serde_json::from_str(&text).unwrap();
    let object = body.as_object().unwrap();
    assert_eq!(object.len(), 2);
    assert!(object.contains_key("annotated_image"));
    assert_eq!(body["od_macular"][0].as_object().unwrap().len(), 7);
}

#[tokio::test]
async fn test_no_detections_returns_empty_list() {
    let upstream = spawn_upstream().await;
    let (app, state) = router_with(Arc::new(BrightSpotDetector), ApiConfig::default());

    let url = format!("http://{}/photo.jpg", upstream);
    let (status, body) = post_detection(app, Some(&url)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["od_macular"].as_array().unwrap().is_empty());
    assert!(body["annotated_image"]
        .as_str()
        .unwrap()
        .starts_with(DATA_URI_PREFIX));
    assert_eq!(state.metrics.successes(ROUTE), 1);
}

#[tokio::test]
async fn test_missing_content_type_still_decodes() {
    let upstream = spawn_upstream().await;
    let (app, _) = router_with(Arc::new(BrightSpotDetector), ApiConfig::default());

    let url = format!("http://{}/untyped", upstream);
    let (status, body) = post_detection(app, Some(&url)).await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["od_macular"].as_array().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_image_above_default_size_with_raised_limit() {
    assert!(noise_png().len() > MAX_IMAGE_SIZE);

    let upstream = spawn_upstream().await;
    let fetcher = FetcherConfig {
        timeout: Duration::from_secs(60),
        max_bytes: 64 * 1024 * 1024,
        ..FetcherConfig::default()
    };
    let (app, state) =
        router_with_fetcher(Arc::new(BrightSpotDetector), ApiConfig::default(), fetcher);

    let url = format!("http://{}/noise.png", upstream);
    let (status, body) = post_detection(app, Some(&url)).await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    let uri = body["annotated_image"].as_str().unwrap();
    let png = STANDARD.decode(&uri[DATA_URI_PREFIX.len()..]).unwrap();
    let annotated = image::load_from_memory(&png).unwrap();
    assert_eq!((annotated.width(), annotated.height()), (NOISE_SIDE, NOISE_SIDE));
    assert_eq!(state.metrics.successes(ROUTE), 1);
}
