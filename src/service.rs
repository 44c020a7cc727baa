//! Analysis service: resolves an analysis by name and runs it over the dataset.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::analysis::{Analysis, AnalysisKind, MeanValue};
use crate::dataset;
use crate::error::RasterAnalysisError;
use crate::executor::{AnalysisExecutor, Executor};
use crate::metrics::ANALYSIS_DURATION;
use crate::raster::{RasterLoader, TiffLoader};

/// Runs analyses over the GeoTIFF images below a dataset directory.
#[derive(Debug)]
pub struct AnalyzeService<L = TiffLoader> {
    dataset_path: PathBuf,
    executor: AnalysisExecutor,
    loader: L,
}

impl AnalyzeService<TiffLoader> {
    /// Return a new AnalyzeService reading TIFF files below `dataset_path`.
    pub fn new<P: Into<PathBuf>>(dataset_path: P, executor: AnalysisExecutor) -> Self {
        Self::with_loader(dataset_path, executor, TiffLoader)
    }
}

impl<L: RasterLoader> AnalyzeService<L> {
    /// Return a new AnalyzeService using a custom raster loader.
    pub fn with_loader<P: Into<PathBuf>>(
        dataset_path: P,
        executor: AnalysisExecutor,
        loader: L,
    ) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            executor,
            loader,
        }
    }

    /// Names of the supported analyses.
    pub fn supported_operations(&self) -> Vec<String> {
        let operations = AnalysisKind::names();
        debug!("Operations {:?}", operations);
        operations
    }

    /// Run the named analysis over every `.tif` file below the dataset directory.
    ///
    /// Blocks until the whole dataset has been processed.
    pub fn analyze(&self, name: &str) -> Result<f64, RasterAnalysisError> {
        let kind = AnalysisKind::from_name(name)?;
        let timer = ANALYSIS_DURATION
            .with_label_values(&[&kind.to_string()])
            .start_timer();
        let result = match kind {
            AnalysisKind::MeanValue => self.run(MeanValue::default()),
        }?;
        let elapsed = timer.stop_and_record();
        info!(analysis = %kind, elapsed_s = elapsed, "analysis complete");
        Ok(result)
    }

    fn run<A: Analysis>(&self, mut analysis: A) -> Result<f64, RasterAnalysisError> {
        let dataset = dataset::tif_dataset(&self.dataset_path);
        let report = self.executor.execute(&mut analysis, dataset, &self.loader)?;
        info!(
            processed = report.processed,
            skipped = report.skipped.len(),
            "dataset analysed"
        );
        Ok(analysis.result())
    }
}
