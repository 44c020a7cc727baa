//! Error handling.

use axum::{
    extract::rejection::JsonRejection,
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ndarray::ShapeError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::AcquireError;
use tracing::{event, Level};

/// Raster analysis service error type
///
/// This type encapsulates the various errors that may occur.
/// Each variant may result in a different API error response.
#[derive(Debug, Error)]
pub enum RasterAnalysisError {
    /// Unknown analysis name requested
    #[error("invalid analysis type: {name}")]
    InvalidAnalysis { name: String },

    /// Error opening a raster file
    #[error("failed to open raster image {}", path.display())]
    RasterOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error decoding a raster file
    #[error("failed to decode raster image {}", path.display())]
    RasterDecode {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },

    /// Raster file uses a layout that cannot be represented as bands
    #[error("unsupported raster layout in {}: {reason}", path.display())]
    UnsupportedRaster { path: PathBuf, reason: String },

    /// Decoded samples do not fit the raster dimensions
    #[error("failed to create array from shape")]
    ShapeInvalid(#[from] ShapeError),

    /// Error deserialising the request body
    #[error("request data is not valid")]
    RequestDataJsonRejection(#[from] JsonRejection),

    /// Error validating the request body (single error)
    #[error("request data is not valid")]
    RequestDataValidationSingle(#[from] validator::ValidationError),

    /// Error validating the request body (multiple errors)
    #[error("request data is not valid")]
    RequestDataValidation(#[from] validator::ValidationErrors),

    /// Error building the analysis worker pool
    #[error("failed to build analysis worker pool")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// Blocking analysis task panicked or was cancelled
    #[error("analysis task did not complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Error talking to the STAC API or downloading an asset
    #[error("error communicating with {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Malformed URL returned by the STAC API
    #[error("invalid URL {url}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Error acquiring a semaphore
    #[error("error acquiring resources")]
    SemaphoreAcquireError(#[from] AcquireError),

    /// Error reading or writing a local file
    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// STAC item field that cannot be used as a local path component
    #[error("unsafe path component {component:?} in STAC item")]
    UnsafeAssetPath { component: String },

    /// Malformed JSON supplied to the acquisition tool
    #[error("invalid JSON in {context}")]
    InvalidJson {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl IntoResponse for RasterAnalysisError {
    /// Convert from a `RasterAnalysisError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorBody {
    /// Main error message
    message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let mut causes = Vec::new();
        let mut current = error.source();
        while let Some(source) = current {
            causes.push(source.to_string());
            current = source.source();
        }
        causes.dedup();
        ErrorBody {
            message: error.to_string(),
            caused_by: (!causes.is_empty()).then_some(causes),
        }
    }
}

/// A response to send in error cases
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Response body
    error: ErrorBody,
}

impl ErrorResponse {
    fn new<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            status,
            error: ErrorBody::new(error),
        }
    }

    /// Return a 400 bad request ErrorResponse
    fn bad_request<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// Return a 500 internal server error ErrorResponse
    fn internal_server_error<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl From<RasterAnalysisError> for ErrorResponse {
    /// Convert from a `RasterAnalysisError` into an `ErrorResponse`.
    fn from(error: RasterAnalysisError) -> Self {
        let response = match &error {
            // Bad request
            RasterAnalysisError::InvalidAnalysis { .. }
            | RasterAnalysisError::RequestDataJsonRejection(_)
            | RasterAnalysisError::RequestDataValidationSingle(_)
            | RasterAnalysisError::RequestDataValidation(_) => Self::bad_request(&error),

            // Internal server error
            RasterAnalysisError::RasterOpen { .. }
            | RasterAnalysisError::RasterDecode { .. }
            | RasterAnalysisError::UnsupportedRaster { .. }
            | RasterAnalysisError::ShapeInvalid(_)
            | RasterAnalysisError::WorkerPool(_)
            | RasterAnalysisError::TaskJoin(_)
            | RasterAnalysisError::Http { .. }
            | RasterAnalysisError::InvalidUrl { .. }
            | RasterAnalysisError::Io { .. }
            | RasterAnalysisError::SemaphoreAcquireError(_)
            | RasterAnalysisError::UnsafeAssetPath { .. }
            | RasterAnalysisError::InvalidJson { .. } => Self::internal_server_error(&error),
        };

        // Log server errors.
        if response.status.is_server_error() {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        match serde_json::to_string_pretty(&self) {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => (
                self.status,
                [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                json_body,
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hyper::HeaderMap;

    // Jump through the hoops to get the body as a string.
    async fn body_string(response: Response) -> String {
        String::from_utf8(
            hyper::body::to_bytes(response.into_body())
                .await
                .unwrap()
                .to_vec(),
        )
        .unwrap()
    }

    async fn test_raster_analysis_error(
        error: RasterAnalysisError,
        status: StatusCode,
        message: &str,
        caused_by: Option<Vec<&'static str>>,
    ) {
        let response = error.into_response();
        assert_eq!(status, response.status());
        let mut headers = HeaderMap::new();
        headers.insert(&header::CONTENT_TYPE, "application/json".parse().unwrap());
        assert_eq!(headers, *response.headers());
        let error_response: ErrorResponse =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(message.to_string(), error_response.error.message);
        let caused_by = caused_by.map(|cb| cb.iter().map(|s| s.to_string()).collect());
        assert_eq!(caused_by, error_response.error.caused_by);
    }

    #[tokio::test]
    async fn invalid_analysis() {
        let error = RasterAnalysisError::InvalidAnalysis {
            name: "MEDIAN".to_string(),
        };
        let message = "invalid analysis type: MEDIAN";
        test_raster_analysis_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn raster_open_error() {
        let error = RasterAnalysisError::RasterOpen {
            path: PathBuf::from("/data/a.tif"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        let message = "failed to open raster image /data/a.tif";
        let caused_by = Some(vec!["no such file"]);
        test_raster_analysis_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, caused_by)
            .await;
    }

    #[tokio::test]
    async fn unsupported_raster() {
        let error = RasterAnalysisError::UnsupportedRaster {
            path: PathBuf::from("b.tif"),
            reason: "palette images".to_string(),
        };
        let message = "unsupported raster layout in b.tif: palette images";
        test_raster_analysis_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, None).await;
    }

    #[tokio::test]
    async fn request_data_validation_single() {
        let validation_error = validator::ValidationError::new("foo");
        let error = RasterAnalysisError::RequestDataValidationSingle(validation_error);
        let message = "request data is not valid";
        let caused_by = Some(vec!["Validation error: foo [{}]"]);
        test_raster_analysis_error(error, StatusCode::BAD_REQUEST, message, caused_by).await;
    }

    #[tokio::test]
    async fn request_data_validation() {
        let mut validation_errors = validator::ValidationErrors::new();
        validation_errors.add("name", validator::ValidationError::new("foo"));
        let error = RasterAnalysisError::RequestDataValidation(validation_errors);
        let message = "request data is not valid";
        let caused_by = Some(vec!["name: Validation error: foo [{}]"]);
        test_raster_analysis_error(error, StatusCode::BAD_REQUEST, message, caused_by).await;
    }

    #[tokio::test]
    async fn shape_error() {
        let error = RasterAnalysisError::ShapeInvalid(ShapeError::from_kind(
            ndarray::ErrorKind::OutOfBounds,
        ));
        let message = "failed to create array from shape";
        let caused_by = Some(vec!["ShapeError/OutOfBounds: out of bounds indexing"]);
        test_raster_analysis_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, caused_by)
            .await;
    }

    #[tokio::test]
    async fn semaphore_acquire_error() {
        let sem = tokio::sync::Semaphore::new(1);
        sem.close();
        let error = RasterAnalysisError::SemaphoreAcquireError(sem.acquire().await.unwrap_err());
        let message = "error acquiring resources";
        let caused_by = Some(vec!["semaphore closed"]);
        test_raster_analysis_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, caused_by)
            .await;
    }

    #[tokio::test]
    async fn unsafe_asset_path() {
        let error = RasterAnalysisError::UnsafeAssetPath {
            component: "../x".to_string(),
        };
        let message = r#"unsafe path component "../x" in STAC item"#;
        test_raster_analysis_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, None).await;
    }

    #[tokio::test]
    async fn task_join_error() {
        let handle = tokio::spawn(async { panic!("boom") });
        let error = RasterAnalysisError::TaskJoin(handle.await.unwrap_err());
        let response = error.into_response();
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, response.status());
        let error_response: ErrorResponse =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!("analysis task did not complete", error_response.error.message);
    }
}
