//! Download orchestration: validate, resolve, name, stream, verify, clean up.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::core::{ByteStream, DownloadRequest, DownloadResult, Extractor};
use crate::download::get_http_client;
use crate::error::{GrabError, Result};
use crate::format::resolve;
use crate::naming::{NameSequencer, VIDEO_PREFIX};
use crate::storage::{self, ArtifactGuard, MEDIA_EXTENSIONS};
use crate::youtube::validate_url;
use crate::ytdlp::YtDlpExtractor;

/// Entry point for video and thumbnail downloads.
///
/// Each call handles one request end to end and never retries. Whatever a
/// failed or cancelled run wrote is removed before it returns.
pub struct Downloader {
    pub(crate) config: Config,
    pub(crate) extractor: Arc<dyn Extractor>,
    pub(crate) names: NameSequencer,
    pub(crate) http: reqwest::Client,
}

impl Downloader {
    pub fn new(config: Config, extractor: Arc<dyn Extractor>) -> Result<Self> {
        let http = get_http_client(config.http_timeout, &config.user_agent)?;
        Ok(Self {
            config,
            extractor,
            names: NameSequencer::new(),
            http,
        })
    }

    /// Downloader bound to the yt-dlp executable named in `config`.
    pub fn with_ytdlp(config: Config) -> Result<Self> {
        let extractor = Arc::new(YtDlpExtractor::from_config(&config));
        Self::new(config, extractor)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.config.downloads_dir
    }

    /// Path of a previously stored file, for serving it back.
    pub fn locate(&self, filename: &str) -> Result<PathBuf> {
        storage::locate(self.downloads_dir(), filename)
    }

    #[instrument(skip(self, request), fields(url = %request.url, quality = %request.quality))]
    pub async fn download(&self, request: &DownloadRequest) -> DownloadResult {
        self.bounded(self.try_download(request)).await
    }

    /// Apply the configured timeout and turn errors into a failed result.
    pub(crate) async fn bounded(
        &self,
        run: impl Future<Output = Result<DownloadResult>>,
    ) -> DownloadResult {
        let outcome = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .unwrap_or_else(|_| Err(GrabError::Timeout(limit))),
            None => run.await,
        };

        outcome.unwrap_or_else(|e| {
            warn!(error = %e, category = %e.category(), "request failed");
            DownloadResult::failed(&e)
        })
    }

    async fn try_download(&self, request: &DownloadRequest) -> Result<DownloadResult> {
        let video_id = validate_url(&request.url)?;
        let spec = resolve(request.quality);

        let dir = self.downloads_dir();
        let reservation = self.names.allocate(dir, VIDEO_PREFIX)?;
        let name = reservation.name();
        let base = name.base();
        let mut guard = ArtifactGuard::new(dir, &base);

        info!(%video_id, file = %base, extractor = self.extractor.name(), "starting download");

        let media = self.extractor.open(&request.url, &spec).await?;

        let ext = if storage::is_safe_extension(&media.ext) {
            media.ext.to_ascii_lowercase()
        } else {
            warn!(reported = %media.ext, "ignoring unusable extension from extractor");
            spec.extension.to_string()
        };
        if ext != spec.extension {
            debug!(predicted = spec.extension, actual = %ext, "container differs from prediction");
        }

        let path = dir.join(name.file_name(&ext));
        let written = write_stream(&path, media.bytes).await?;
        let filename = storage::find_artifact(dir, &base, &ext, MEDIA_EXTENSIONS)?;
        guard.disarm();

        info!(%filename, bytes = written, "download complete");

        let kind = if request.quality.is_audio() { "Audio" } else { "Video" };
        Ok(DownloadResult::completed(
            filename,
            Some(request.quality),
            media.title,
            format!("{kind} download completed successfully!"),
        ))
    }
}

/// Stream chunks to `path` through a buffered writer.
async fn write_stream(path: &Path, mut bytes: ByteStream) -> Result<u64> {
    let file = File::create(path).await.map_err(|e| GrabError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut written: u64 = 0;

    while let Some(chunk) = bytes.next().await {
        let chunk = chunk?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| GrabError::io(path, e))?;
        written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| GrabError::io(path, e))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorCategory;
    use crate::core::{MediaStream, Metadata};
    use crate::format::FormatSpec;
    use futures_util::stream;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Extractor whose stream never ends.
    struct Stalled;

    #[async_trait::async_trait]
    impl Extractor for Stalled {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn probe(&self, _url: &str) -> Result<Metadata> {
            Ok(Metadata::default())
        }

        async fn open(&self, _url: &str, spec: &FormatSpec) -> Result<MediaStream> {
            let first = stream::iter(vec![Ok(b"partial".to_vec())]);
            Ok(MediaStream {
                ext: spec.extension.to_string(),
                title: None,
                bytes: first.chain(stream::pending()).boxed(),
            })
        }
    }

    fn files(dir: &Path) -> Vec<String> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().into_string().unwrap())
                .collect(),
            Err(_) => vec![],
        }
    }

    #[tokio::test]
    async fn timeout_cleans_partial_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::default()
            .with_downloads_dir(dir.path())
            .with_timeout(Some(Duration::from_millis(100)));
        let downloader = Downloader::new(config, Arc::new(Stalled)).unwrap();

        let result = downloader
            .download(&DownloadRequest::new("https://youtu.be/abc123", "best"))
            .await;

        assert_eq!(result.category(), Some(ErrorCategory::Timeout));
        assert!(files(dir.path()).is_empty(), "{:?}", files(dir.path()));
    }

    #[tokio::test]
    async fn cancellation_cleans_partial_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::default().with_downloads_dir(dir.path());
        let downloader = Arc::new(Downloader::new(config, Arc::new(Stalled)).unwrap());

        let task = {
            let downloader = Arc::clone(&downloader);
            tokio::spawn(async move {
                downloader
                    .download(&DownloadRequest::new("https://youtu.be/abc123", "best"))
                    .await
            })
        };

        // wait until the partial chunk has reached the disk
        let partial = dir.path().join("video1.mp4");
        for _ in 0..200 {
            if files(dir.path()).contains(&"video1.mp4".to_string()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(partial.exists());

        task.abort();
        let _ = task.await;

        assert!(files(dir.path()).is_empty(), "{:?}", files(dir.path()));
    }

    #[tokio::test]
    async fn locate_goes_through_downloads_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("video3.mp4"), b"x").unwrap();
        let config = Config::default().with_downloads_dir(dir.path());
        let downloader = Downloader::new(config, Arc::new(Stalled)).unwrap();

        assert!(downloader.locate("video3.mp4").is_ok());
        assert!(matches!(
            downloader.locate("video4.mp4"),
            Err(GrabError::FileNotFound(_))
        ));
    }
}
