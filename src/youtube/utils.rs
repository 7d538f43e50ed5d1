use url::Url;

use crate::error::{GrabError, Result};

/// Check that a host is youtube.com / youtu.be or one of their subdomains.
fn is_youtube_domain(domain: &str) -> bool {
    let domain = domain.to_ascii_lowercase();
    domain == "youtube.com"
        || domain.ends_with(".youtube.com")
        || domain == "youtu.be"
        || domain.ends_with(".youtu.be")
}

fn parse_url(url: &str) -> Option<Url> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    // Fallback for URLs without scheme
    let normalized = if !url.starts_with("http://") && !url.starts_with("https://") {
        format!("https://{}", url)
    } else {
        url.to_string()
    };
    Url::parse(&normalized).ok()
}

/// Check if URL is a YouTube link using strict domain validation
pub fn is_youtube_url(url: &str) -> bool {
    parse_url(url)
        .and_then(|parsed| parsed.domain().map(is_youtube_domain))
        .unwrap_or(false)
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn valid_id(id: &str) -> Option<String> {
    (!id.is_empty() && id.chars().all(is_id_char)).then(|| id.to_string())
}

/// Extract the video id from one of the accepted URL shapes:
/// `youtube.com/watch?v=ID`, `youtu.be/ID` and `youtube.com/embed/ID`.
pub fn parse_id(url: &str) -> Option<String> {
    let parsed = parse_url(url)?;
    let domain = parsed.domain()?.to_ascii_lowercase();
    if !is_youtube_domain(&domain) {
        return None;
    }

    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());

    if domain == "youtu.be" || domain.ends_with(".youtu.be") {
        return segments.next().and_then(valid_id);
    }

    match segments.next()? {
        "watch" => parsed
            .query_pairs()
            .find(|(k, _)| k == "v")
            .and_then(|(_, v)| valid_id(&v)),
        "embed" => segments.next().and_then(valid_id),
        _ => None,
    }
}

/// Validate a URL before any work is done for it.
pub fn validate_url(url: &str) -> Result<String> {
    if !is_youtube_url(url) {
        return Err(GrabError::InvalidUrl(format!(
            "Not a YouTube URL: {}",
            url
        )));
    }

    parse_id(url).ok_or_else(|| {
        GrabError::InvalidUrl(format!("Cannot extract video ID from: {}", url))
    })
}

/// Construct YouTube watch URL from video ID
pub fn build_watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}
