//! This crate provides a Raster Analysis Service. It computes aggregate statistics, currently
//! the mean pixel value, over a directory of GeoTIFF imagery and exposes them through a small
//! HTTP API. A companion binary, `download-data`, fills the dataset directory with imagery
//! found through a [STAC](https://stacspec.org) search API.
//!
//! An analysis request enumerates the dataset lazily, loads each image and folds it into a
//! running accumulator. Images are processed either sequentially or on a fixed-size pool of
//! worker threads, depending on configuration. Workers only ever reduce images to small
//! contributions; a single coordinating thread merges those into the accumulator.
//!
//! The service is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Axum](axum) web framework, built by the Tokio team, on top of the [hyper] HTTP library.
//! * [Serde](serde) performs (de)serialisation of JSON request and response data.
//! * [ndarray] provides [NumPy](https://numpy.org)-like n-dimensional arrays used in numerical
//!   computation.
//! * [tiff] decodes raster imagery and [rayon] provides the analysis worker pool.

pub mod acquisition;
pub mod analysis;
pub mod app;
pub mod app_state;
pub mod cli;
pub mod dataset;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod models;
pub mod raster;
pub mod server;
pub mod service;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod validated_json;
