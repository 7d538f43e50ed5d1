//! Maps free-text upstream failures onto a closed set of user-facing categories.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

#[derive(EnumIter, Display, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ErrorCategory {
    InvalidInput,
    Unavailable,
    RegionBlocked,
    AgeRestricted,
    Private,
    Unknown,
    NotFound,
    Storage,
    Persistence,
    Fetch,
    Timeout,
}

impl ErrorCategory {
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidInput => "Please provide a valid YouTube URL",
            Self::Unavailable => "Video is unavailable or private",
            Self::RegionBlocked => "Video is not available in this region",
            Self::AgeRestricted => "Age-restricted content cannot be downloaded",
            Self::Private => "This is a private video and cannot be downloaded",
            Self::Unknown => "Failed to download video",
            Self::NotFound => "Requested media was not found",
            Self::Storage => "Could not write to the downloads directory",
            Self::Persistence => "Downloaded file not found",
            Self::Fetch => "Failed to download thumbnail",
            Self::Timeout => "Download timed out",
        }
    }
}

/// Ordered: the first matching signal wins.
const SIGNALS: &[(&str, ErrorCategory)] = &[
    ("unavailable", ErrorCategory::Unavailable),
    ("not available", ErrorCategory::RegionBlocked),
    ("Sign in to confirm", ErrorCategory::AgeRestricted),
    ("Private video", ErrorCategory::Private),
    ("blocked", ErrorCategory::RegionBlocked),
];

/// Classify a raw extractor or network failure description.
///
/// Unrecognized phrasings fall into [`ErrorCategory::Unknown`].
pub fn classify(raw: &str) -> ErrorCategory {
    SIGNALS
        .iter()
        .find(|(signal, _)| raw.contains(signal))
        .map(|(_, category)| *category)
        .unwrap_or(ErrorCategory::Unknown)
}
