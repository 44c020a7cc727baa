//! Command Line Interface (CLI) arguments.

use clap::Parser;

/// Raster analysis service command line interface
#[derive(Clone, Debug, Parser)]
#[command(version, about)]
pub struct CommandLineArgs {
    /// The IP address on which the service should listen
    #[arg(long, default_value = "0.0.0.0", env = "RASTER_ANALYSIS_HOST")]
    pub host: String,
    /// The port to which the service should bind
    #[arg(long, default_value_t = 8080, env = "RASTER_ANALYSIS_PORT")]
    pub port: u16,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "RASTER_ANALYSIS_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/raster-analysis/certs/cert.pem",
        env = "RASTER_ANALYSIS_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/raster-analysis/certs/key.pem",
        env = "RASTER_ANALYSIS_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for operations to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "RASTER_ANALYSIS_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// Directory containing the GeoTIFF dataset, searched recursively
    #[arg(long, default_value = "dataset", env = "RASTER_ANALYSIS_DATASET_PATH")]
    pub dataset_path: String,
    /// Number of analysis worker threads. One or fewer analyses images sequentially.
    /// Defaults to the number of CPUs.
    #[arg(long, env = "RASTER_ANALYSIS_WORKERS")]
    pub analysis_workers: Option<usize>,
    /// Skip images that fail to load instead of failing the whole analysis
    #[arg(long, default_value_t = false, env = "RASTER_ANALYSIS_SKIP_FAILED_IMAGES")]
    pub skip_failed_images: bool,
    /// Log level used when `RUST_LOG` is not set
    #[arg(long, default_value = "debug", env = "RASTER_ANALYSIS_LOG_LEVEL")]
    pub log_level: String,
}

impl CommandLineArgs {
    /// Configured number of analysis workers.
    pub fn workers(&self) -> usize {
        self.analysis_workers.unwrap_or_else(num_cpus::get)
    }
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}
