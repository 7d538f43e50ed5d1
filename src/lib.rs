pub mod classify;
pub mod config;
pub mod core;
mod download;
pub mod error;
pub mod format;
pub mod naming;
pub mod orchestrator;
pub mod storage;
pub mod thumbnail;
pub mod youtube;
pub mod ytdlp;

pub use classify::{ErrorCategory, classify};
pub use config::Config;
pub use core::{
    ByteStream, DownloadRequest, DownloadResult, Extractor, MediaStream, Metadata, Thumbnail,
};
pub use error::{GrabError, Result};
pub use format::{FormatInfo, FormatSpec, QualityToken, resolve};
pub use naming::{NameSequencer, SequencedName, next_sequence};
pub use orchestrator::Downloader;
pub use ytdlp::YtDlpExtractor;
