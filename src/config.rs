use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::download::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};

pub const ENV_DOWNLOADS_DIR: &str = "TUBEGRAB_DOWNLOADS_DIR";
pub const ENV_YTDLP: &str = "TUBEGRAB_YTDLP";
pub const ENV_FFMPEG: &str = "TUBEGRAB_FFMPEG";
pub const ENV_TIMEOUT_SECS: &str = "TUBEGRAB_TIMEOUT_SECS";

/// Runtime configuration for a [`crate::Downloader`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Where artifacts are written and looked up
    pub downloads_dir: PathBuf,
    /// yt-dlp executable
    pub ytdlp_path: String,
    /// ffmpeg executable used to label audio downloads as mp3; `None` keeps
    /// the source container
    pub ffmpeg_path: Option<String>,
    /// Upper bound for a whole download or thumbnail run
    pub timeout: Option<Duration>,
    /// Timeout for plain HTTP requests (thumbnails)
    pub http_timeout: Duration,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("downloads"),
            ytdlp_path: "yt-dlp".to_string(),
            ffmpeg_path: Some("ffmpeg".to_string()),
            timeout: None,
            http_timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Defaults overridden by `TUBEGRAB_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_DOWNLOADS_DIR).filter(|v| !v.trim().is_empty()) {
            config.downloads_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup(ENV_YTDLP).filter(|v| !v.trim().is_empty()) {
            config.ytdlp_path = path;
        }
        if let Some(path) = lookup(ENV_FFMPEG) {
            // empty disables transcoding
            config.ffmpeg_path = Some(path).filter(|v| !v.trim().is_empty());
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(0) => config.timeout = None,
                Ok(secs) => config.timeout = Some(Duration::from_secs(secs)),
                Err(e) => warn!(value = %raw, error = %e, "ignoring invalid {ENV_TIMEOUT_SECS}"),
            }
        }

        config
    }

    pub fn with_downloads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.downloads_dir = dir.into();
        self
    }

    pub fn with_ytdlp_path(mut self, path: impl Into<String>) -> Self {
        self.ytdlp_path = path.into();
        self
    }

    pub fn with_ffmpeg_path(mut self, path: Option<String>) -> Self {
        self.ffmpeg_path = path;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}
