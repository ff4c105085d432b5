// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP client for caller-supplied image URLs

use reqwest::{header, Client};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::image_utils::MAX_IMAGE_SIZE;

/// Content type assumed when the upstream server omits one
pub const DEFAULT_CONTENT_TYPE: &str = "image/png";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid image URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("{status} Error for url: {url}")]
    Status { status: u16, url: String },

    #[error("Image at {url} is too large: {size} bytes (max: {max} bytes)")]
    TooLarge { url: String, size: u64, max: usize },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Fetcher settings
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Whole-request timeout
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Largest accepted response body
    pub max_bytes: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_bytes: MAX_IMAGE_SIZE,
        }
    }
}

/// Raw bytes retrieved from an image URL
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    /// Response content type without parameters, or `image/png` if absent
    pub content_type: String,
    pub url: String,
}

/// Shared client for downloading images
///
/// One `reqwest::Client` is built at startup and reused across requests so
/// connections are pooled.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: Client,
    config: FetcherConfig,
}

impl ImageFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("od-macular-detection/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// GET `url` and return the body if the server answered 2xx
    pub async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let parsed = parse_image_url(url)?;
        debug!("Fetching image from {}", parsed);

        let mut response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let max = self.config.max_bytes;
        if let Some(length) = response.content_length() {
            if length > max as u64 {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    size: length,
                    max,
                });
            }
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(normalize_content_type)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| request_error(url, e))? {
            if bytes.len() + chunk.len() > max {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    size: (bytes.len() + chunk.len()) as u64,
                    max,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        debug!(
            "Fetched {} bytes ({}) from {}",
            bytes.len(),
            content_type,
            url
        );

        Ok(FetchedImage {
            bytes,
            content_type,
            url: url.to_string(),
        })
    }
}

fn request_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            source: e,
        }
    }
}

/// Only absolute http(s) URLs are fetched
pub fn parse_image_url(raw: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}

/// `image/jpeg; charset=binary` -> `image/jpeg`
fn normalize_content_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
