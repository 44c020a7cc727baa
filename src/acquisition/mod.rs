//! Dataset acquisition.
//!
//! Searches a STAC API for imagery matching a date range, cloud cover threshold and optional
//! geometry, then downloads every asset of the matching items below an output directory.
//! This backs the `download-data` binary.

pub mod args;
pub mod download;
pub mod limiter;
pub mod stac;

use tracing::info;

use crate::error::RasterAnalysisError;
use args::DownloadArgs;
use download::{DownloadSummary, Downloader};
use stac::{SearchRequest, StacClient};

/// Search for items and download their assets.
pub async fn run(args: &DownloadArgs) -> Result<DownloadSummary, RasterAnalysisError> {
    info!("Configuring download operation");
    let request = SearchRequest::from_args(args)?;
    if let Ok(parameters) = serde_json::to_string_pretty(&request) {
        info!("Configured parameters:\n{}", parameters);
    }

    let http = reqwest::Client::new();
    let client = StacClient::new(&args.search_url, http.clone());
    info!("Searching {}", client.url());
    let items = client.search(&request).await?;
    info!("Found {} items", items.len());

    let downloader = Downloader::new(http, &args.output_dir, args.download_limit());
    let summary = downloader.download_items(&items).await;
    info!("Download operation has been completed");
    Ok(summary)
}
