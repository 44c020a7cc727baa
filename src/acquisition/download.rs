//! Asset download.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use url::Url;

use crate::acquisition::limiter::DownloadLimiter;
use crate::acquisition::stac::{StacAsset, StacItem};
use crate::error::RasterAnalysisError;

/// Path component used when an item lacks a collection or a datetime.
const UNKNOWN: &str = "unknown";

/// Result of downloading one asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The asset was fetched and written.
    Downloaded,
    /// The target file already existed.
    Existing,
}

/// Counts of asset downloads by outcome.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub existing: usize,
    pub failed: usize,
}

/// Local path of an asset: `<output_dir>/<collection>/<date>/<id>_<key><ext>`.
///
/// The components come from the STAC API, so any that could leave `output_dir` are rejected.
pub fn asset_path(
    output_dir: &Path,
    item: &StacItem,
    key: &str,
    asset: &StacAsset,
) -> Result<PathBuf, RasterAnalysisError> {
    let collection = item.collection.as_deref().unwrap_or(UNKNOWN);
    let date = item.date().unwrap_or(UNKNOWN);
    let file_name = format!("{}_{}{}", item.id, key, href_extension(&asset.href));
    Ok(output_dir
        .join(path_component(collection)?)
        .join(path_component(date)?)
        .join(path_component(&file_name)?))
}

fn path_component(component: &str) -> Result<&str, RasterAnalysisError> {
    if component.is_empty()
        || component.contains("..")
        || component.contains(|c: char| c == '/' || c == '\\')
    {
        return Err(RasterAnalysisError::UnsafeAssetPath {
            component: component.to_string(),
        });
    }
    Ok(component)
}

/// Extension of the file an href points at, including the dot, or an empty string.
///
/// Only the last path segment is considered, so an href ending in `/` has no extension.
fn href_extension(href: &str) -> String {
    let path = match Url::parse(href) {
        Ok(url) => url.path().to_string(),
        Err(_) => href.to_string(),
    };
    let name = path.rsplit('/').next().unwrap_or_default();
    Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Downloads STAC item assets into a directory, a bounded number at a time.
#[derive(Debug)]
pub struct Downloader {
    client: reqwest::Client,
    output_dir: PathBuf,
    limiter: Arc<DownloadLimiter>,
}

impl Downloader {
    /// Return a new Downloader.
    ///
    /// # Arguments
    ///
    /// * `client`: HTTP client used to fetch assets
    /// * `output_dir`: Root directory of the downloaded dataset
    /// * `download_limit`: Optional maximum number of concurrent downloads
    pub fn new<P: Into<PathBuf>>(
        client: reqwest::Client,
        output_dir: P,
        download_limit: Option<usize>,
    ) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
            limiter: Arc::new(DownloadLimiter::new(download_limit)),
        }
    }

    /// Download every asset of every item.
    ///
    /// Assets whose target file exists are left alone. Failed downloads are logged and
    /// counted, and do not stop the others.
    pub async fn download_items(&self, items: &[StacItem]) -> DownloadSummary {
        let mut summary = DownloadSummary::default();
        let mut tasks = JoinSet::new();
        for item in items {
            for (key, asset) in &item.assets {
                let target = match asset_path(&self.output_dir, item, key, asset) {
                    Ok(target) => target,
                    Err(err) => {
                        error!("Unable to download {}: {}", asset.href, err);
                        summary.failed += 1;
                        continue;
                    }
                };
                let href = asset.href.clone();
                let client = self.client.clone();
                let limiter = self.limiter.clone();
                tasks.spawn(async move {
                    let outcome = download_asset(&client, &limiter, &href, &target).await;
                    (href, outcome)
                });
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(DownloadOutcome::Downloaded))) => summary.downloaded += 1,
                Ok((_, Ok(DownloadOutcome::Existing))) => summary.existing += 1,
                Ok((href, Err(err))) => {
                    error!("Unable to download {}: {}", href, err);
                    let mut current = std::error::Error::source(&err);
                    while let Some(source) = current {
                        debug!("Caused by: {}", source);
                        current = source.source();
                    }
                    summary.failed += 1;
                }
                Err(err) => {
                    error!("Download task did not complete: {}", err);
                    summary.failed += 1;
                }
            }
        }
        info!(
            "Downloaded {} assets, {} already present, {} failed",
            summary.downloaded, summary.existing, summary.failed
        );
        summary
    }
}

/// Fetch one asset to `target` unless it already exists.
///
/// The body is streamed to a `.part` file which is renamed into place once complete. The
/// `.part` file is removed if the transfer fails.
async fn download_asset(
    client: &reqwest::Client,
    limiter: &DownloadLimiter,
    href: &str,
    target: &Path,
) -> Result<DownloadOutcome, RasterAnalysisError> {
    if target.exists() {
        debug!("Skipping existing {}", target.display());
        return Ok(DownloadOutcome::Existing);
    }
    let _permit = limiter.download().await?;
    debug!("Downloading {} to {}", href, target.display());

    let mut response = client
        .get(href)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(http_error(href))?;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(io_error(parent))?;
    }
    let mut partial = OsString::from(target.as_os_str());
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let written = async {
        write_body(&mut response, href, &partial).await?;
        tokio::fs::rename(&partial, target)
            .await
            .map_err(io_error(target))
    }
    .await;
    if written.is_err() {
        if let Err(err) = tokio::fs::remove_file(&partial).await {
            debug!("Unable to remove {}: {}", partial.display(), err);
        }
    }
    written.map(|_| DownloadOutcome::Downloaded)
}

/// Write a response body to `path` one chunk at a time.
async fn write_body(
    response: &mut reqwest::Response,
    href: &str,
    path: &Path,
) -> Result<(), RasterAnalysisError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(io_error(path))?;
    while let Some(chunk) = response.chunk().await.map_err(http_error(href))? {
        file.write_all(&chunk).await.map_err(io_error(path))?;
    }
    file.flush().await.map_err(io_error(path))
}

/// Map a request error for `href` into a [RasterAnalysisError].
fn http_error(href: &str) -> impl FnOnce(reqwest::Error) -> RasterAnalysisError {
    let url = href.to_string();
    move |source| RasterAnalysisError::Http { url, source }
}

/// Map an I/O error on `path` into a [RasterAnalysisError].
fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> RasterAnalysisError {
    let path = path.to_path_buf();
    move |source| RasterAnalysisError::Io { path, source }
}
