//! [`Extractor`] backed by the `yt-dlp` executable.
//!
//! Metadata comes from `--dump-single-json`. Media is streamed from the
//! process's stdout (`-o -`); audio downloads are piped through ffmpeg when
//! one is configured so the output really is mp3.

use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::core::{ByteStream, Extractor, MediaStream, Metadata};
use crate::error::{GrabError, Result};
use crate::format::{FormatInfo, FormatSpec};
use crate::youtube::{build_watch_url, parse_id};

pub mod types;

pub use types::{YtDlpFormat, YtDlpInfo, YtDlpThumbnail};

const BASE_ARGS: &[&str] = &["--no-check-certificate", "--no-playlist", "--no-warnings"];
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    ytdlp_path: String,
    ffmpeg_path: Option<String>,
}

impl YtDlpExtractor {
    pub fn new(ytdlp_path: impl Into<String>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            ffmpeg_path: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ytdlp_path.clone()).with_ffmpeg(config.ffmpeg_path.clone())
    }

    pub fn with_ffmpeg(mut self, ffmpeg_path: Option<String>) -> Self {
        self.ffmpeg_path = ffmpeg_path;
        self
    }

    /// Short and embed links are handed to yt-dlp as canonical watch URLs.
    fn target(url: &str) -> String {
        parse_id(url)
            .map(|id| build_watch_url(&id))
            .unwrap_or_else(|| url.to_string())
    }

    async fn dump_json(&self, url: &str) -> Result<YtDlpInfo> {
        let output = Command::new(&self.ytdlp_path)
            .args(BASE_ARGS)
            .arg("--dump-single-json")
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| spawn_error(&self.ytdlp_path, e))?;

        if !output.status.success() {
            return Err(GrabError::Extraction(failure_message(
                &self.ytdlp_path,
                output.status,
                &String::from_utf8_lossy(&output.stderr),
            )));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }

    fn spawn_download(&self, url: &str, selector: &str) -> Result<Child> {
        Command::new(&self.ytdlp_path)
            .args(BASE_ARGS)
            .args(["--quiet", "-f", selector, "-o", "-"])
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.ytdlp_path, e))
    }

    fn spawn_transcoder(ffmpeg: &str) -> Result<Child> {
        Command::new(ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-i", "pipe:0"])
            .args(["-vn", "-f", "mp3", "pipe:1"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(ffmpeg, e))
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    #[instrument(skip(self))]
    async fn probe(&self, url: &str) -> Result<Metadata> {
        let info = self.dump_json(&Self::target(url)).await?;
        Ok(Metadata::from(info))
    }

    #[instrument(skip(self, spec), fields(selector = %spec.ytdlp_selector()))]
    async fn open(&self, url: &str, spec: &FormatSpec) -> Result<MediaStream> {
        let target = Self::target(url);
        let info = self.dump_json(&target).await?;
        let title = Some(info.title).filter(|t| !t.is_empty());
        let formats: Vec<FormatInfo> = info.formats.into_iter().map(FormatInfo::from).collect();

        let (selector, source_ext) = match spec.select(&formats) {
            Some(f) => (f.format_id.clone(), f.ext.clone()),
            None => (spec.ytdlp_selector(), spec.extension.to_string()),
        };
        debug!(%selector, %source_ext, "starting yt-dlp");

        let mut download = self.spawn_download(&target, &selector)?;
        let source = take_stdout(&mut download, &self.ytdlp_path)?;
        let mut stderr = vec![collect_stderr(&mut download)];
        let mut children = vec![(self.ytdlp_path.clone(), download)];

        let (stdout, ext) = match (&self.ffmpeg_path, spec.transcode_audio) {
            (Some(ffmpeg), true) => {
                let mut transcoder = Self::spawn_transcoder(ffmpeg)?;
                let mut sink = transcoder
                    .stdin
                    .take()
                    .ok_or_else(|| GrabError::Extraction(format!("{ffmpeg} stdin unavailable")))?;
                let mut source = source;
                tokio::spawn(async move {
                    if let Err(e) = tokio::io::copy(&mut source, &mut sink).await {
                        debug!(error = %e, "transcoder pipe closed early");
                    }
                });
                let stdout = take_stdout(&mut transcoder, ffmpeg)?;
                stderr.push(collect_stderr(&mut transcoder));
                children.push((ffmpeg.clone(), transcoder));
                (stdout, spec.extension.to_string())
            }
            _ => (source, source_ext),
        };

        Ok(MediaStream {
            ext,
            title,
            bytes: into_stream(ProcessOutput {
                stdout,
                children,
                stderr,
            }),
        })
    }
}

fn spawn_error(program: &str, e: std::io::Error) -> GrabError {
    GrabError::Extraction(format!("failed to run {program}: {e}"))
}

fn failure_message(program: &str, status: ExitStatus, stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("{program} exited with {status}")
    } else {
        stderr.to_string()
    }
}

fn take_stdout(child: &mut Child, program: &str) -> Result<ChildStdout> {
    child
        .stdout
        .take()
        .ok_or_else(|| GrabError::Extraction(format!("{program} stdout unavailable")))
}

fn collect_stderr(child: &mut Child) -> JoinHandle<String> {
    let stderr = child.stderr.take();
    tokio::spawn(async move {
        let mut text = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut text).await;
        }
        text
    })
}

/// Running pipeline whose last stdout carries the media bytes.
struct ProcessOutput {
    stdout: ChildStdout,
    children: Vec<(String, Child)>,
    stderr: Vec<JoinHandle<String>>,
}

impl ProcessOutput {
    async fn finish(mut self) -> Result<()> {
        let mut failed = None;
        for (program, child) in &mut self.children {
            let status = child
                .wait()
                .await
                .map_err(|e| GrabError::Extraction(format!("waiting for {program}: {e}")))?;
            if !status.success() && failed.is_none() {
                failed = Some((program.clone(), status));
            }
        }

        let Some((program, status)) = failed else {
            return Ok(());
        };

        let mut stderr = String::new();
        for handle in self.stderr {
            stderr.push_str(&handle.await.unwrap_or_default());
        }
        Err(GrabError::Extraction(failure_message(&program, status, &stderr)))
    }
}

fn into_stream(output: ProcessOutput) -> ByteStream {
    stream::unfold(Some(output), |state| async move {
        let Some(mut output) = state else {
            return None;
        };
        let mut buf = vec![0u8; CHUNK_SIZE];
        match output.stdout.read(&mut buf).await {
            Ok(0) => match output.finish().await {
                Ok(()) => None,
                Err(e) => Some((Err(e), None)),
            },
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(buf), Some(output)))
            }
            Err(e) => Some((
                Err(GrabError::Extraction(format!("reading media stream: {e}"))),
                None,
            )),
        }
    })
    .boxed()
}
