// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image acquisition for the detection pipeline
//!
//! This module provides:
//! - Downloading images from caller-supplied URLs
//! - Decoding fetched bytes into in-memory images
//! - PNG data URI encoding of annotated images

pub mod fetcher;
pub mod image_utils;

pub use fetcher::{FetchError, FetchedImage, FetcherConfig, ImageFetcher};
pub use image_utils::{decode_image_bytes, detect_format, encode_png_data_uri, ImageError, ImageInfo};
