use crate::error::RasterAnalysisError;
use crate::raster::{RasterImage, RasterLoader};

use axum::Router;
use ndarray::Array3;
use std::fs::{self, File};
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use tiff::encoder::{colortype, TiffEncoder};

/// Create an empty file, and any missing parent directories.
pub(crate) fn touch(path: &Path) {
    create_parent(path);
    fs::write(path, b"").unwrap();
}

fn create_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
}

/// Write a single band 32-bit float TIFF with every pixel set to `value`.
pub(crate) fn write_gray_f32_tiff(path: &Path, width: u32, height: u32, value: f32) {
    create_parent(path);
    let data = vec![value; (width * height) as usize];
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    encoder
        .write_image::<colortype::Gray32Float>(width, height, &data)
        .unwrap();
}

/// Write a three band 8-bit TIFF from pixel-interleaved samples.
pub(crate) fn write_rgb8_tiff(path: &Path, width: u32, height: u32, data: &[u8]) {
    create_parent(path);
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    encoder
        .write_image::<colortype::RGB8>(width, height, data)
        .unwrap();
}

/// Serve `router` on an ephemeral local port for the rest of the test.
///
/// Must be called from within a Tokio runtime.
pub(crate) fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(router.into_make_service());
    tokio::spawn(server);
    addr
}

/// HTTP client that ignores proxy settings from the environment.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// A loader that builds images in memory instead of reading files.
#[derive(Clone, Debug)]
pub(crate) struct FakeLoader {
    shape: (usize, usize, usize),
    /// Fill value; `None` fills each image with the number in its file stem.
    value: Option<f64>,
    failing: Vec<PathBuf>,
}

impl FakeLoader {
    /// Every image has `shape` and is filled with `value`.
    pub(crate) fn constant(value: f64, shape: (usize, usize, usize)) -> Self {
        Self {
            shape,
            value: Some(value),
            failing: Vec::new(),
        }
    }

    /// Image `<n>.tif` has `shape` and is filled with `n`.
    pub(crate) fn by_index(shape: (usize, usize, usize)) -> Self {
        Self {
            shape,
            value: None,
            failing: Vec::new(),
        }
    }

    /// Loading `path` fails as if the file did not exist.
    pub(crate) fn failing(mut self, path: &str) -> Self {
        self.failing.push(PathBuf::from(path));
        self
    }
}

impl RasterLoader for FakeLoader {
    fn load(&self, path: &Path) -> Result<RasterImage, RasterAnalysisError> {
        if self.failing.iter().any(|p| p == path) {
            return Err(RasterAnalysisError::RasterOpen {
                path: path.to_owned(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        let value = self.value.unwrap_or_else(|| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse().ok())
                .expect("file stem to be a number")
        });
        Ok(RasterImage::new(path, Array3::from_elem(self.shape, value)))
    }
}
