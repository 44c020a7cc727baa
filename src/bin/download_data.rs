//! This file defines the dataset download tool entry point.

use raster_analysis_service::acquisition;
use raster_analysis_service::tracing;

use std::process::ExitCode;

/// Application entry point
#[tokio::main]
async fn main() -> ExitCode {
    let args = acquisition::args::parse();
    tracing::init_tracing(&args.log_level);
    ::tracing::debug!("{:?}", args);
    match acquisition::run(&args).await {
        // Individual asset failures are logged by the downloader.
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            ::tracing::error!("download failed: {}", err);
            let mut current = std::error::Error::source(&err);
            while let Some(source) = current {
                ::tracing::error!("Caused by: {}", source);
                current = source.source();
            }
            ExitCode::FAILURE
        }
    }
}
