//! Thumbnail downloads. Same shape as a video download, but the image is
//! fetched over plain HTTP and buffered whole.

use tracing::{info, instrument};

use crate::core::DownloadResult;
use crate::download::download_binary;
use crate::error::{GrabError, Result};
use crate::naming::THUMBNAIL_PREFIX;
use crate::orchestrator::Downloader;
use crate::storage::{ArtifactGuard, IMAGE_EXTENSIONS, find_artifact};
use crate::youtube::validate_url;

pub const THUMBNAIL_EXTENSION: &str = "jpg";

impl Downloader {
    #[instrument(skip(self), fields(extractor = self.extractor.name()))]
    pub async fn fetch_thumbnail(&self, url: &str) -> DownloadResult {
        self.bounded(self.try_fetch_thumbnail(url)).await
    }

    async fn try_fetch_thumbnail(&self, url: &str) -> Result<DownloadResult> {
        validate_url(url)?;

        let metadata = self.extractor.probe(url).await?;
        let thumbnail = metadata
            .best_thumbnail()
            .ok_or_else(|| GrabError::ThumbnailNotFound(url.to_string()))?;

        let dir = self.downloads_dir();
        let reservation = self.names.allocate(dir, THUMBNAIL_PREFIX)?;
        let base = reservation.name().base();
        let mut guard = ArtifactGuard::new(dir, &base);

        let bytes = download_binary(&self.http, &thumbnail.url).await?;

        let path = dir.join(reservation.name().file_name(THUMBNAIL_EXTENSION));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| GrabError::io(&path, e))?;
        let filename = find_artifact(dir, &base, THUMBNAIL_EXTENSION, IMAGE_EXTENSIONS)?;
        guard.disarm();

        info!(%filename, source = %thumbnail.url, bytes = bytes.len(), "thumbnail saved");

        let title = Some(metadata.title.clone()).filter(|t| !t.is_empty());
        Ok(DownloadResult::completed(
            filename,
            None,
            title,
            "Thumbnail download completed successfully!",
        ))
    }
}
