use crate::cli::CommandLineArgs;
use crate::error::RasterAnalysisError;
use crate::executor::{self, FailurePolicy};
use crate::service::AnalyzeService;

use std::sync::Arc;

/// Shared application state passed to each request handler.
#[derive(Debug)]
pub struct AppState {
    /// Command line arguments.
    pub args: CommandLineArgs,

    /// Analysis service, including the worker pool built at startup.
    pub service: AnalyzeService,
}

impl AppState {
    /// Create and return an [AppState].
    pub fn new(args: &CommandLineArgs) -> Result<Self, RasterAnalysisError> {
        let policy = if args.skip_failed_images {
            FailurePolicy::Skip
        } else {
            FailurePolicy::Abort
        };
        let executor = executor::executor_for(args.workers(), policy)?;
        Ok(Self {
            args: args.clone(),
            service: AnalyzeService::new(&args.dataset_path, executor),
        })
    }
}

/// AppState wrapped in an Atomic Reference Count (Arc) to allow multiple references.
pub type SharedAppState = Arc<AppState>;
