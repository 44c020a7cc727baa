//! This file defines the raster analysis service binary entry point.

use raster_analysis_service::app;
use raster_analysis_service::cli;
use raster_analysis_service::metrics;
use raster_analysis_service::server;
use raster_analysis_service::tracing;

use std::process::ExitCode;

/// Application entry point
#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    tracing::init_tracing(&args.log_level);
    ::tracing::debug!("{:?}", args);
    metrics::register_metrics();
    let service = match app::service(&args) {
        Ok(service) => service,
        Err(err) => {
            ::tracing::error!("failed to start: {}", err);
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = server::serve(&args, service).await {
        ::tracing::error!("server error: {}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
