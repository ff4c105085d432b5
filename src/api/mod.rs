// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod http_server;
pub mod od_macular;
pub mod server;

pub use errors::{ApiError, ErrorResponse};
pub use http_server::{create_router, AppState, HealthResponse, OD_MACULAR_ROUTE};
pub use od_macular::{od_macular_detection_handler, DetectionQuery, DetectionResponse};
pub use server::{ApiConfig, ApiServer};
