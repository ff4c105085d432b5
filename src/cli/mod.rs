// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Polling client for the detection endpoint
//!
//! Sends the same image to a running service at a fixed interval. Useful as a
//! smoke test and to drive the request metrics.

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::header::ACCEPT;
use std::time::Duration;
use tracing::{info, warn};

use crate::api::OD_MACULAR_ROUTE;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:7005";
pub const DEFAULT_IMAGE_URL: &str =
    "https://upload.wikimedia.org/wikipedia/commons/2/26/Fundus_of_eye_normal.jpg";

/// Poll the OD/macular detection endpoint
#[derive(Parser, Debug, Clone)]
#[command(name = "od-poll")]
#[command(version, about = "Repeatedly call the OD/macular detection endpoint", long_about = None)]
pub struct PollArgs {
    /// Base URL of the detection service
    #[arg(long, env = "OD_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Image URL sent as `image_url`
    #[arg(long, env = "OD_IMAGE_URL", default_value = DEFAULT_IMAGE_URL)]
    pub image_url: String,

    /// Pause between requests in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// Stop after this many requests (runs forever if unset)
    #[arg(long)]
    pub count: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,
}

/// Outcome counts of a finished poll run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub sent: u64,
    pub failed: u64,
}

/// Send one detection request and return the response status
pub async fn poll_once(
    client: &reqwest::Client,
    endpoint: &str,
    image_url: &str,
) -> Result<reqwest::StatusCode> {
    let url = format!("{}{}", endpoint.trim_end_matches('/'), OD_MACULAR_ROUTE);
    let response = client
        .post(&url)
        .query(&[("image_url", image_url)])
        .header(ACCEPT, "application/json")
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?;

    Ok(response.status())
}

/// Run the polling loop
///
/// A failed request is logged and the loop carries on. Only a client that
/// cannot be built ends the run early.
pub async fn run_poll(args: PollArgs) -> Result<PollSummary> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;
    let interval = Duration::from_millis(args.interval_ms);

    info!(
        "Polling {}{} every {}ms with {}",
        args.endpoint, OD_MACULAR_ROUTE, args.interval_ms, args.image_url
    );

    let mut summary = PollSummary::default();
    loop {
        if let Some(count) = args.count {
            if summary.sent >= count {
                break;
            }
        }

        summary.sent += 1;
        match poll_once(&client, &args.endpoint, &args.image_url).await {
            Ok(status) => info!("Response status: {}", status.as_u16()),
            Err(e) => {
                summary.failed += 1;
                warn!("Request failed: {:#}", e);
            }
        }

        let finished = args.count.map_or(false, |count| summary.sent >= count);
        if !finished {
            tokio::time::sleep(interval).await;
        }
    }

    Ok(summary)
}
