//! Quality tokens and the format selection they resolve to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Height ceilings accepted as quality tokens.
pub const SUPPORTED_HEIGHTS: [u32; 6] = [2160, 1440, 1080, 720, 480, 360];

/// Caller-supplied quality preference.
///
/// Parsing never fails: anything unrecognized becomes [`QualityToken::Best`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QualityToken {
    #[default]
    Best,
    Worst,
    AudioOnly,
    MaxHeight(u32),
}

impl QualityToken {
    pub fn parse(token: &str) -> Self {
        let token = token.trim().to_ascii_lowercase();
        match token.as_str() {
            "best" => Self::Best,
            "worst" => Self::Worst,
            "audio" => Self::AudioOnly,
            other => other
                .trim_end_matches('p')
                .parse::<u32>()
                .ok()
                .filter(|h| SUPPORTED_HEIGHTS.contains(h))
                .map_or(Self::Best, Self::MaxHeight),
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::AudioOnly)
    }
}

impl fmt::Display for QualityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Best => write!(f, "best"),
            Self::Worst => write!(f, "worst"),
            Self::AudioOnly => write!(f, "audio"),
            Self::MaxHeight(h) => write!(f, "{h}"),
        }
    }
}

impl From<String> for QualityToken {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&str> for QualityToken {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<QualityToken> for String {
    fn from(q: QualityToken) -> Self {
        q.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selection {
    Best,
    Worst,
    Audio,
    MaxHeight(u32),
}

/// Extractor-facing selection criteria plus the expected output extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormatSpec {
    pub selection: Selection,
    pub extension: &'static str,
    /// Output is labeled as compressed audio regardless of the source container.
    pub transcode_audio: bool,
}

/// A stream offered by the extractor.
///
/// Lists are ordered worst to best: a later entry is preferred over an
/// earlier one when everything else is equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatInfo {
    pub format_id: String,
    pub ext: String,
    pub height: Option<u32>,
    pub has_video: bool,
    pub has_audio: bool,
    pub bitrate: Option<f32>,
}

impl FormatInfo {
    fn is_combined(&self) -> bool {
        self.has_video && self.has_audio
    }

    fn is_mp4(&self) -> bool {
        self.ext.eq_ignore_ascii_case("mp4")
    }
}

/// Resolve a quality token into a format spec.
pub fn resolve(quality: QualityToken) -> FormatSpec {
    match quality {
        QualityToken::Best => video(Selection::Best),
        QualityToken::Worst => video(Selection::Worst),
        QualityToken::MaxHeight(h) => video(Selection::MaxHeight(h)),
        QualityToken::AudioOnly => FormatSpec {
            selection: Selection::Audio,
            extension: "mp3",
            transcode_audio: true,
        },
    }
}

fn video(selection: Selection) -> FormatSpec {
    FormatSpec {
        selection,
        extension: "mp4",
        transcode_audio: false,
    }
}

impl FormatSpec {
    /// Equivalent yt-dlp `-f` expression.
    pub fn ytdlp_selector(&self) -> String {
        match self.selection {
            Selection::Best => "best[ext=mp4]/best".to_string(),
            Selection::Worst => "worst[ext=mp4]/worst".to_string(),
            Selection::Audio => "bestaudio".to_string(),
            Selection::MaxHeight(h) => {
                format!("best[height<={h}][ext=mp4]/best[height<={h}]/best")
            }
        }
    }

    /// Pick a stream from `formats` according to this spec.
    ///
    /// Returns `None` when nothing in the list can satisfy the selection
    /// kind: no combined stream for a video selection, no audio for audio.
    /// Callers then fall back to [`FormatSpec::ytdlp_selector`].
    pub fn select<'a>(&self, formats: &'a [FormatInfo]) -> Option<&'a FormatInfo> {
        match self.selection {
            Selection::Audio => select_audio(formats),
            Selection::Best => {
                let pool = prefer_mp4(video_pool(formats));
                pool.into_iter()
                    .max_by_key(|(i, f)| (f.height.unwrap_or(0), *i))
                    .map(|(_, f)| f)
            }
            Selection::Worst => {
                let pool = prefer_mp4(video_pool(formats));
                pool.into_iter()
                    .min_by_key(|(i, f)| (f.height.unwrap_or(0), *i))
                    .map(|(_, f)| f)
            }
            Selection::MaxHeight(ceiling) => {
                let pool = video_pool(formats);
                let under = pool
                    .iter()
                    .filter(|(_, f)| f.height.is_some_and(|h| h <= ceiling))
                    .max_by_key(|(i, f)| (f.height, f.is_mp4(), *i));
                if let Some((_, f)) = under {
                    return Some(*f);
                }
                // nothing fits under the ceiling: take the closest one above it
                pool.iter()
                    .filter(|(_, f)| f.height.is_some())
                    .min_by_key(|(i, f)| (f.height, !f.is_mp4(), usize::MAX - *i))
                    .or_else(|| pool.last())
                    .map(|(_, f)| *f)
            }
        }
    }
}

/// Streams carrying both audio and video. Video-only streams are never
/// picked, since the output would be silent.
fn video_pool(formats: &[FormatInfo]) -> Vec<(usize, &FormatInfo)> {
    formats
        .iter()
        .enumerate()
        .filter(|(_, f)| f.is_combined())
        .collect()
}

fn prefer_mp4(pool: Vec<(usize, &FormatInfo)>) -> Vec<(usize, &FormatInfo)> {
    if pool.iter().any(|(_, f)| f.is_mp4()) {
        pool.into_iter().filter(|(_, f)| f.is_mp4()).collect()
    } else {
        pool
    }
}

fn select_audio(formats: &[FormatInfo]) -> Option<&FormatInfo> {
    let audio_only = formats
        .iter()
        .enumerate()
        .filter(|(_, f)| f.has_audio && !f.has_video)
        .max_by(|(ia, a), (ib, b)| {
            let ra = a.bitrate.unwrap_or(0.0);
            let rb = b.bitrate.unwrap_or(0.0);
            ra.total_cmp(&rb).then(ia.cmp(ib))
        });
    if let Some((_, f)) = audio_only {
        return Some(f);
    }
    formats.iter().rev().find(|f| f.has_audio)
}
