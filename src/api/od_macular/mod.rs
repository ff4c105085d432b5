// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OD/macular detection endpoint module
//!
//! Provides POST /od-macular-detection for detecting the optic disc and
//! macula in an image fetched from a URL.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{od_macular_detection_handler, run_pipeline};
pub use request::DetectionQuery;
pub use response::DetectionResponse;
