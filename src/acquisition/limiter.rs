//! Download concurrency limiting

use crate::error::RasterAnalysisError;

use tokio::sync::{Semaphore, SemaphorePermit};

/// [crate::acquisition::limiter::DownloadLimiter] bounds the number of asset downloads in
/// flight. Limiting is performed using a Tokio Semaphore.
#[derive(Debug)]
pub struct DownloadLimiter {
    /// Optional semaphore for downloads.
    downloads: Option<Semaphore>,
}

impl DownloadLimiter {
    /// Returns a new DownloadLimiter object.
    pub fn new(download_limit: Option<usize>) -> Self {
        Self {
            downloads: download_limit.map(Semaphore::new),
        }
    }

    /// Acquire a download resource.
    pub async fn download(&self) -> Result<Option<SemaphorePermit<'_>>, RasterAnalysisError> {
        optional_acquire(&self.downloads).await
    }
}

/// Acquire a permit on an optional Semaphore, if present.
async fn optional_acquire(
    sem: &Option<Semaphore>,
) -> Result<Option<SemaphorePermit<'_>>, RasterAnalysisError> {
    if let Some(sem) = sem {
        sem.acquire().await.map(Some).map_err(|err| err.into())
    } else {
        Ok(None)
    }
}
