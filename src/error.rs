use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::classify::{ErrorCategory, classify};

#[derive(Error, Debug)]
pub enum GrabError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Downloaded file not found: {0}")]
    MissingOutput(String),

    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout for URL: {0}")]
    RequestTimeout(String),

    #[error("HTTP error {status} for URL: {url}")]
    HttpError { status: u16, url: String },

    #[error("No thumbnail URL found for: {0}")]
    ThumbnailNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl GrabError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// User-facing category for this failure.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidUrl(_) | Self::InvalidName(_) => ErrorCategory::InvalidInput,
            Self::Extraction(msg) => classify(msg),
            Self::Io { .. } => ErrorCategory::Storage,
            Self::MissingOutput(_) => ErrorCategory::Persistence,
            Self::Network(_) | Self::RequestTimeout(_) | Self::HttpError { .. } => {
                ErrorCategory::Fetch
            }
            Self::ThumbnailNotFound(_) | Self::FileNotFound(_) => ErrorCategory::NotFound,
            Self::Json(_) => ErrorCategory::Unknown,
            Self::Timeout(_) => ErrorCategory::Timeout,
        }
    }
}

pub type Result<T> = std::result::Result<T, GrabError>;
