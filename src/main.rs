use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tubegrab::{Config, DownloadRequest, DownloadResult, Downloader, QualityToken};

#[derive(Parser, Debug)]
#[command(
    name = "tubegrab",
    version,
    about = "Download YouTube video, audio and thumbnails",
    long_about = "Download YouTube video, audio and thumbnails into sequentially named files.\n\n\
    Examples:\n\
      tubegrab download https://youtu.be/VIDEO_ID              # Best quality mp4\n\
      tubegrab download -q 720 https://youtu.be/VIDEO_ID       # At most 720p\n\
      tubegrab download -q audio https://youtu.be/VIDEO_ID     # Audio only\n\
      tubegrab thumbnail https://youtu.be/VIDEO_ID             # Largest thumbnail\n\
      tubegrab locate video1.mp4                               # Path of a stored file"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Downloads directory (default: $TUBEGRAB_DOWNLOADS_DIR or ./downloads)
    #[arg(short = 'd', long = "dir", global = true)]
    downloads_dir: Option<PathBuf>,

    /// yt-dlp executable
    #[arg(long = "yt-dlp", global = true)]
    ytdlp: Option<String>,

    /// Give up on a request after this many seconds
    #[arg(long = "timeout", global = true)]
    timeout_secs: Option<u64>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a video or its audio track
    Download {
        /// YouTube URL (watch, youtu.be or embed link)
        url: String,

        /// best, worst, audio, 2160, 1440, 1080, 720, 480 or 360
        #[arg(short, long, default_value = "best")]
        quality: String,
    },
    /// Download the largest thumbnail of a video
    Thumbnail {
        /// YouTube URL (watch, youtu.be or embed link)
        url: String,
    },
    /// Print the path of a previously downloaded file
    Locate {
        filename: String,
    },
}

fn build_config(args: &Args) -> Config {
    let mut config = Config::from_env();
    if let Some(dir) = &args.downloads_dir {
        config = config.with_downloads_dir(dir);
    }
    if let Some(ytdlp) = &args.ytdlp {
        config = config.with_ytdlp_path(ytdlp);
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_timeout((secs > 0).then(|| Duration::from_secs(secs)));
    }
    config
}

fn print_result(result: &DownloadResult) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(if result.is_completed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = build_config(&args);
    let downloader = Downloader::with_ytdlp(config)?;

    match &args.command {
        Command::Download { url, quality } => {
            let request = DownloadRequest::new(url.as_str(), QualityToken::parse(quality));
            let result = downloader.download(&request).await;
            print_result(&result)
        }
        Command::Thumbnail { url } => {
            let result = downloader.fetch_thumbnail(url).await;
            print_result(&result)
        }
        Command::Locate { filename } => match downloader.locate(filename) {
            Ok(path) => {
                println!("{}", path.display());
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                eprintln!("Error: {} ({})", e, e.category().message());
                Ok(ExitCode::FAILURE)
            }
        },
    }
}
