use serde::{Deserialize, Serialize};

use crate::core::{Metadata, Thumbnail};
use crate::format::FormatInfo;

/// Subset of `yt-dlp --dump-single-json` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YtDlpInfo {
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub thumbnails: Vec<YtDlpThumbnail>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YtDlpThumbnail {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YtDlpFormat {
    pub format_id: String,
    pub ext: String,
    pub height: Option<u32>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    /// Audio bitrate in kbps
    pub abr: Option<f32>,
    /// Total bitrate in kbps
    pub tbr: Option<f32>,
}

fn has_codec(codec: &Option<String>) -> bool {
    codec.as_deref().is_some_and(|c| !c.is_empty() && c != "none")
}

impl From<YtDlpFormat> for FormatInfo {
    fn from(f: YtDlpFormat) -> Self {
        FormatInfo {
            has_video: has_codec(&f.vcodec),
            has_audio: has_codec(&f.acodec),
            bitrate: f.abr.or(f.tbr),
            format_id: f.format_id,
            ext: f.ext,
            height: f.height,
        }
    }
}

impl From<YtDlpInfo> for Metadata {
    fn from(info: YtDlpInfo) -> Self {
        let mut thumbnails: Vec<Thumbnail> = info
            .thumbnails
            .into_iter()
            .map(|t| Thumbnail {
                url: t.url,
                width: t.width,
                height: t.height,
            })
            .collect();
        if thumbnails.is_empty()
            && let Some(url) = info.thumbnail
        {
            thumbnails.push(Thumbnail::new(url));
        }

        Metadata {
            title: info.title,
            thumbnails,
            formats: info.formats.into_iter().map(FormatInfo::from).collect(),
        }
    }
}
