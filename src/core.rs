use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::classify::ErrorCategory;
use crate::error::{GrabError, Result};
use crate::format::{FormatInfo, FormatSpec, QualityToken};

/// Route under which stored files are served back to callers.
pub const RETRIEVAL_ROUTE: &str = "/download-file";

/// A request to download one video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    #[serde(default)]
    pub quality: QualityToken,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, quality: impl Into<QualityToken>) -> Self {
        Self {
            url: url.into(),
            quality: quality.into(),
        }
    }
}

/// Terminal outcome of a download or thumbnail run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DownloadResult {
    Completed {
        filename: String,
        #[serde(rename = "downloadUrl")]
        download_url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        quality: Option<QualityToken>,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        message: String,
    },
    Failed {
        #[serde(rename = "errorCategory")]
        category: ErrorCategory,
        message: String,
    },
}

impl DownloadResult {
    pub fn completed(
        filename: String,
        quality: Option<QualityToken>,
        title: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        let download_url = format!("{RETRIEVAL_ROUTE}/{filename}");
        Self::Completed {
            filename,
            download_url,
            quality,
            title,
            message: message.into(),
        }
    }

    pub fn failed(err: &GrabError) -> Self {
        let category = err.category();
        Self::Failed {
            category,
            message: category.message().to_string(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::Completed { filename, .. } => Some(filename),
            Self::Failed { .. } => None,
        }
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { category, .. } => Some(*category),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Thumbnail {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl Thumbnail {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: None,
            height: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    fn area(&self) -> u64 {
        u64::from(self.width.unwrap_or(0)) * u64::from(self.height.unwrap_or(0))
    }
}

/// Video metadata reported by an extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    /// Ordered as reported; later entries are the extractor's better candidates.
    pub thumbnails: Vec<Thumbnail>,
    pub formats: Vec<FormatInfo>,
}

impl Metadata {
    /// Largest thumbnail by pixel area. Equal areas (including lists with no
    /// dimensions at all) resolve to the later entry.
    pub fn best_thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnails
            .iter()
            .enumerate()
            .max_by_key(|(i, t)| (t.area(), *i))
            .map(|(_, t)| t)
    }
}

pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// An opened media stream.
pub struct MediaStream {
    /// Container extension the bytes will actually be in.
    pub ext: String,
    pub title: Option<String>,
    pub bytes: ByteStream,
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("ext", &self.ext)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

/// Capability that talks to the video host.
///
/// Failures describing the upstream problem should be reported as
/// [`GrabError::Extraction`] with the upstream text intact, so they can be
/// classified.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Fetch title, thumbnails and available formats.
    async fn probe(&self, url: &str) -> Result<Metadata>;

    /// Open a byte stream of the media selected by `spec`.
    async fn open(&self, url: &str, spec: &FormatSpec) -> Result<MediaStream>;
}
