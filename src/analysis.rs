//! Analyses over raster datasets.
//!
//! An analysis accumulates a statistic over any number of images. Ingestion is split in two so
//! that the expensive part can run on worker threads:
//!
//! * [Analysis::contribute] reduces one image to a small contribution. It is a pure function of
//!   the image and may run anywhere.
//! * [Analysis::merge] folds a contribution into the accumulator. Executors call it from a
//!   single thread only, which keeps every read-modify-write of the accumulator atomic.

use crate::error::RasterAnalysisError;
use crate::raster::RasterImage;

use strum_macros::Display;
use tracing::debug;

/// Trait for analyses.
///
/// This forms the contract between the executors and the individual analyses.
pub trait Analysis: Send {
    /// Per-image summary produced on worker threads.
    type Contribution: Send + std::fmt::Debug;

    /// Reduce one image to its contribution.
    fn contribute(image: &RasterImage) -> Self::Contribution;

    /// Fold a contribution into the accumulator.
    fn merge(&mut self, contribution: Self::Contribution);

    /// Current value of the statistic.
    fn result(&self) -> f64;

    /// Ingest one image.
    fn add(&mut self, image: &RasterImage) {
        self.merge(Self::contribute(image))
    }
}

/// Pixel count and sum of a single image.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PixelSum {
    /// Number of samples over all bands
    pub pixel_count: u64,
    /// Sum of all samples
    pub sum: f64,
}

/// Running mean of every pixel of every band of every image.
///
/// NaN or infinite pixel values propagate into the mean.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeanValue {
    pixel_count: u64,
    mean: f64,
}

impl MeanValue {
    /// Number of pixels ingested so far.
    pub fn pixel_count(&self) -> u64 {
        self.pixel_count
    }
}

impl Analysis for MeanValue {
    type Contribution = PixelSum;

    fn contribute(image: &RasterImage) -> PixelSum {
        let pixels = image.array();
        PixelSum {
            pixel_count: pixels.len() as u64,
            sum: pixels.sum(),
        }
    }

    fn merge(&mut self, contribution: PixelSum) {
        let total = self.pixel_count + contribution.pixel_count;
        if total == 0 {
            return;
        }
        self.mean =
            (self.mean * self.pixel_count as f64 + contribution.sum) / total as f64;
        self.pixel_count = total;
    }

    fn result(&self) -> f64 {
        self.mean
    }
}

/// Supported analyses.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisKind {
    /// [MeanValue]
    MeanValue,
}

impl AnalysisKind {
    /// Every supported analysis.
    pub const ALL: &'static [AnalysisKind] = &[AnalysisKind::MeanValue];

    /// Resolve an analysis by name.
    pub fn from_name(name: &str) -> Result<Self, RasterAnalysisError> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.to_string() == name)
            .ok_or_else(|| {
                debug!("unknown analysis {}", name);
                RasterAnalysisError::InvalidAnalysis {
                    name: name.to_string(),
                }
            })
    }

    /// Names of every supported analysis.
    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(ToString::to_string).collect()
    }
}
