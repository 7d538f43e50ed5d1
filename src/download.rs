use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use tracing::debug;

use crate::error::{GrabError, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";

/// Initialize HTTP client with default headers and the given timeout
pub fn get_http_client(timeout: Duration, user_agent: &str) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    let ua = HeaderValue::from_str(user_agent)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers.insert(USER_AGENT, ua);

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// Execute a GET request, turning non-success statuses into errors
async fn execute_request(client: &reqwest::Client, url: &str) -> Result<reqwest::Response> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            GrabError::RequestTimeout(url.to_string())
        } else {
            GrabError::Network(e)
        }
    })?;

    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(GrabError::HttpError {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}

/// Download binary data from URL into memory.
///
/// Only meant for small payloads such as thumbnails.
pub async fn download_binary(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = execute_request(client, url).await?;
    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            GrabError::RequestTimeout(url.to_string())
        } else {
            GrabError::Network(e)
        }
    })?;
    debug!(url, len = bytes.len(), "downloaded binary");
    Ok(bytes.to_vec())
}
