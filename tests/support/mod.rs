// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// tests/support/mod.rs - Shared fixtures: upstream image server and fake detectors
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header, Request, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, Rgb, RgbImage};
use od_macular_detection::{
    api::{create_router, ApiConfig, AppState, OD_MACULAR_ROUTE},
    detection::{DetectionError, DetectionRecord, Detector},
    monitoring::DetectionMetrics,
    vision::{FetcherConfig, ImageFetcher},
};
use serde_json::Value;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tower::ServiceExt;

pub const ROUTE: &str = OD_MACULAR_ROUTE;

/// Side of the noise image, large enough that its PNG exceeds 10 MiB
pub const NOISE_SIDE: u32 = 2000;

/// Dark 512x512 fundus-like image with one bright disc centred at (150, 200)
pub fn fundus_png() -> Vec<u8> {
    fundus_fixture().to_vec()
}

/// Encoded once per test binary; upstream routes hand out cheap clones
fn fundus_fixture() -> Bytes {
    static FUNDUS: OnceLock<Bytes> = OnceLock::new();
    FUNDUS.get_or_init(|| Bytes::from(encode_fundus())).clone()
}

fn encode_fundus() -> Vec<u8> {
    let mut image = RgbImage::from_pixel(512, 512, Rgb([40, 10, 10]));
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let dx = x as i64 - 150;
        let dy = y as i64 - 200;
        if dx * dx + dy * dy < 40 * 40 {
            *pixel = Rgb([250, 230, 120]);
        }
    }
    encode(image, ImageFormat::Png)
}

pub fn tiny_jpeg() -> Vec<u8> {
    encode(RgbImage::from_pixel(16, 8, Rgb([0, 128, 255])), ImageFormat::Jpeg)
}

/// Incompressible RGB noise, PNG-encoded without filtering
pub fn noise_png() -> Bytes {
    static NOISE: OnceLock<Bytes> = OnceLock::new();
    NOISE
        .get_or_init(|| {
            let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
            let pixels: Vec<u8> = (0..NOISE_SIDE as usize * NOISE_SIDE as usize * 3)
                .map(|_| {
                    state = state
                        .wrapping_mul(6_364_136_223_846_793_005)
                        .wrapping_add(1_442_695_040_888_963_407);
                    (state >> 56) as u8
                })
                .collect();

            let mut buf = Vec::new();
            PngEncoder::new_with_quality(&mut buf, CompressionType::Fast, FilterType::NoFilter)
                .write_image(&pixels, NOISE_SIDE, NOISE_SIDE, ExtendedColorType::Rgb8)
                .unwrap();
            Bytes::from(buf)
        })
        .clone()
}

fn encode(image: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap();
    buf
}

/// Serve a fixed set of image routes on 127.0.0.1 and return the address
pub async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route(
            "/fundus.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], fundus_fixture()) }),
        )
        .route(
            "/photo.jpg",
            get(|| async { ([(header::CONTENT_TYPE, "image/jpeg; charset=binary")], tiny_jpeg()) }),
        )
        .route("/untyped", get(|| async { Response::new(Body::from(fundus_fixture())) }))
        .route(
            "/noise.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], noise_png()) }),
        )
        .route("/missing.png", get(|| async { StatusCode::NOT_FOUND }))
        .route(
            "/broken.png",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
        )
        .route(
            "/garbage.png",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "image/png")],
                    b"this is not an image at all".to_vec(),
                )
            }),
        )
        .route(
            "/huge.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![0u8; 64 * 1024]) }),
        )
        .route(
            "/slow.png",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                ([(header::CONTENT_TYPE, "image/png")], fundus_fixture())
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Reports the bounding box of bright pixels as a single optic disc
pub struct BrightSpotDetector;

impl Detector for BrightSpotDetector {
    fn name(&self) -> &str {
        "bright-spot"
    }

    fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectionRecord>, DetectionError> {
        let rgb = image.to_rgb8();
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, pixel) in rgb.enumerate_pixels() {
            if pixel[0] > 200 && pixel[1] > 200 {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }

        Ok(bounds
            .map(|(x0, y0, x1, y1)| DetectionRecord {
                xmin: x0 as f32,
                ymin: y0 as f32,
                xmax: (x1 + 1) as f32,
                ymax: (y1 + 1) as f32,
                confidence: 0.87,
                class_id: 0,
                name: "optic_disc".to_string(),
            })
            .into_iter()
            .collect())
    }
}

pub struct FailingDetector;

impl Detector for FailingDetector {
    fn name(&self) -> &str {
        "failing"
    }

    fn detect(&self, _image: &DynamicImage) -> Result<Vec<DetectionRecord>, DetectionError> {
        Err(DetectionError::Inference("tensor shape mismatch".to_string()))
    }
}

pub struct PanickingDetector;

impl Detector for PanickingDetector {
    fn name(&self) -> &str {
        "panicking"
    }

    fn detect(&self, _image: &DynamicImage) -> Result<Vec<DetectionRecord>, DetectionError> {
        panic!("model blew up");
    }
}

/// Blocks the calling thread before answering with no detections
pub struct SlowDetector(pub Duration);

impl Detector for SlowDetector {
    fn name(&self) -> &str {
        "slow"
    }

    fn detect(&self, _image: &DynamicImage) -> Result<Vec<DetectionRecord>, DetectionError> {
        std::thread::sleep(self.0);
        Ok(Vec::new())
    }
}

/// Fetcher used by most tests: short timeout, 32 KiB body limit
pub fn small_fetcher_config() -> FetcherConfig {
    FetcherConfig {
        timeout: Duration::from_secs(2),
        max_bytes: 32 * 1024,
        ..FetcherConfig::default()
    }
}

pub fn test_state(detector: Arc<dyn Detector>, config: ApiConfig) -> AppState {
    test_state_with(detector, config, small_fetcher_config())
}

pub fn test_state_with(
    detector: Arc<dyn Detector>,
    config: ApiConfig,
    fetcher_config: FetcherConfig,
) -> AppState {
    let fetcher = ImageFetcher::new(fetcher_config).unwrap();

    AppState::new(
        detector,
        Arc::new(fetcher),
        Arc::new(DetectionMetrics::new().unwrap()),
        config,
    )
}

pub fn detection_uri(image_url: Option<&str>) -> String {
    match image_url {
        Some(url) => {
            let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
            format!("{}?image_url={}", ROUTE, encoded)
        }
        None => ROUTE.to_string(),
    }
}

/// POST to the detection route through the router and decode the JSON body
pub async fn post_detection(app: Router, image_url: Option<&str>) -> (StatusCode, Value) {
    post_detection_uri(app, detection_uri(image_url)).await
}

/// Like `post_detection` but with the query string given verbatim
pub async fn post_detection_query(app: Router, query: &str) -> (StatusCode, Value) {
    post_detection_uri(app, format!("{}?{}", ROUTE, query)).await
}

async fn post_detection_uri(app: Router, uri: String) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::post(uri)
                .header(header::ACCEPT, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap();
    (status, json)
}

pub fn router_with(detector: Arc<dyn Detector>, config: ApiConfig) -> (Router, AppState) {
    router_with_fetcher(detector, config, small_fetcher_config())
}

pub fn router_with_fetcher(
    detector: Arc<dyn Detector>,
    config: ApiConfig,
    fetcher_config: FetcherConfig,
) -> (Router, AppState) {
    let state = test_state_with(detector, config, fetcher_config);
    (create_router(state.clone()), state)
}

/// Like `post_detection` but returns the body text untouched
pub async fn post_detection_raw(app: Router, image_url: Option<&str>) -> (StatusCode, String) {
    let response = app
        .oneshot(
            Request::post(detection_uri(image_url))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}
