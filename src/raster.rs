//! Raster image loading.
//!
//! Images are decoded with the [tiff] crate into a `(band, row, column)` [ndarray] of `f64`
//! samples. The file handle only lives for the duration of [RasterLoader::load], so an image
//! handed to an analysis never holds an open file.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ndarray::{Array3, ArrayView2, ArrayView3, Axis};
use num_traits::AsPrimitive;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::ColorType;
use tracing::debug;

use crate::error::RasterAnalysisError;

/// Pixel data of a single raster image.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterImage {
    path: PathBuf,
    bands: Array3<f64>,
}

impl RasterImage {
    /// Return a new RasterImage from band-major pixel data of shape `(bands, rows, columns)`.
    pub fn new<P: Into<PathBuf>>(path: P, bands: Array3<f64>) -> Self {
        Self {
            path: path.into(),
            bands,
        }
    }

    /// Open and decode the TIFF image at `path`.
    pub fn open(path: &Path) -> Result<Self, RasterAnalysisError> {
        let file = File::open(path).map_err(|source| RasterAnalysisError::RasterOpen {
            path: path.to_owned(),
            source,
        })?;
        let decode_error = |source| RasterAnalysisError::RasterDecode {
            path: path.to_owned(),
            source,
        };
        let mut decoder = Decoder::new(BufReader::new(file))
            .map_err(decode_error)?
            .with_limits(Limits::unlimited());
        let (width, height) = decoder.dimensions().map_err(decode_error)?;
        let sample_count = samples_per_pixel(path, decoder.colortype().map_err(decode_error)?)?;
        let samples = widen_samples(path, decoder.read_image().map_err(decode_error)?)?;
        // Chunky TIFF data is pixel-interleaved; move the sample axis to the front.
        let interleaved = Array3::from_shape_vec(
            (height as usize, width as usize, sample_count),
            samples,
        )?;
        let bands = interleaved
            .permuted_axes([2, 0, 1])
            .as_standard_layout()
            .into_owned();
        debug!(
            path = %path.display(),
            shape = ?bands.shape(),
            "decoded raster image"
        );
        Ok(Self::new(path, bands))
    }

    /// Path the image was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Band indexes, numbered from 1.
    pub fn indexes(&self) -> Vec<usize> {
        (1..=self.band_count()).collect()
    }

    /// Number of bands.
    pub fn band_count(&self) -> usize {
        self.bands.len_of(Axis(0))
    }

    /// Pixel grid of the band with 1-based `index`, or `None` if there is no such band.
    pub fn read(&self, index: usize) -> Option<ArrayView2<'_, f64>> {
        index
            .checked_sub(1)
            .filter(|i| *i < self.band_count())
            .map(|i| self.bands.index_axis(Axis(0), i))
    }

    /// All bands as a `(bands, rows, columns)` array.
    pub fn array(&self) -> ArrayView3<'_, f64> {
        self.bands.view()
    }
}

/// Number of samples per pixel for a TIFF colour type; each sample becomes a band.
fn samples_per_pixel(path: &Path, color_type: ColorType) -> Result<usize, RasterAnalysisError> {
    match color_type {
        ColorType::Gray(_) | ColorType::Palette(_) => Ok(1),
        ColorType::GrayA(_) => Ok(2),
        ColorType::RGB(_) => Ok(3),
        ColorType::RGBA(_) | ColorType::CMYK(_) => Ok(4),
        other => Err(RasterAnalysisError::UnsupportedRaster {
            path: path.to_owned(),
            reason: format!("colour type {:?}", other),
        }),
    }
}

fn widen<T: AsPrimitive<f64>>(samples: Vec<T>) -> Vec<f64> {
    samples.into_iter().map(|sample| sample.as_()).collect()
}

/// Convert decoded samples of any supported sample format to `f64`.
fn widen_samples(path: &Path, result: DecodingResult) -> Result<Vec<f64>, RasterAnalysisError> {
    let samples = match result {
        DecodingResult::U8(buf) => widen(buf),
        DecodingResult::U16(buf) => widen(buf),
        DecodingResult::U32(buf) => widen(buf),
        DecodingResult::U64(buf) => widen(buf),
        DecodingResult::I8(buf) => widen(buf),
        DecodingResult::I16(buf) => widen(buf),
        DecodingResult::I32(buf) => widen(buf),
        DecodingResult::I64(buf) => widen(buf),
        DecodingResult::F32(buf) => widen(buf),
        DecodingResult::F64(buf) => buf,
        #[allow(unreachable_patterns)]
        _ => {
            return Err(RasterAnalysisError::UnsupportedRaster {
                path: path.to_owned(),
                reason: "sample format".to_string(),
            })
        }
    };
    Ok(samples)
}

/// Loads raster images for analysis.
///
/// Implementations must be shareable between the threads of the analysis worker pool.
pub trait RasterLoader: Sync {
    /// Load the image at `path`.
    fn load(&self, path: &Path) -> Result<RasterImage, RasterAnalysisError>;
}

/// Loads TIFF and GeoTIFF images from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct TiffLoader;

impl RasterLoader for TiffLoader {
    fn load(&self, path: &Path) -> Result<RasterImage, RasterAnalysisError> {
        RasterImage::open(path)
    }
}
