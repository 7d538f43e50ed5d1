//! Sequential `{prefix}{n}.{ext}` file naming.
//!
//! The directory contents are the source of truth: the next number is one
//! past the largest number already on disk for the prefix. [`NameSequencer`]
//! adds per directory+prefix serialization on top so that concurrent runs in
//! the same process never receive the same number.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use regex::Regex;
use tracing::debug;

use crate::error::{GrabError, Result};

pub const VIDEO_PREFIX: &str = "video";
pub const THUMBNAIL_PREFIX: &str = "thumbnail";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequencedName {
    pub prefix: String,
    pub number: u64,
}

impl SequencedName {
    /// Base name without extension, e.g. `video3`.
    pub fn base(&self) -> String {
        format!("{}{}", self.prefix, self.number)
    }

    pub fn file_name(&self, ext: &str) -> String {
        format!("{}.{}", self.base(), ext)
    }
}

impl fmt::Display for SequencedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.number)
    }
}

/// Scan `dir` and compute the next free number for `prefix`.
///
/// Creates `dir` (with parents) when it does not exist yet.
pub fn next_sequence(dir: &Path, prefix: &str) -> Result<SequencedName> {
    fs::create_dir_all(dir).map_err(|e| GrabError::io(dir, e))?;

    let pattern = Regex::new(&format!(r"^{}(\d+)\.[^.]+$", regex::escape(prefix)))
        .map_err(|e| GrabError::InvalidName(format!("Bad name prefix {prefix:?}: {e}")))?;

    let mut max = 0u64;
    for entry in fs::read_dir(dir).map_err(|e| GrabError::io(dir, e))? {
        let entry = entry.map_err(|e| GrabError::io(dir, e))?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if let Some(caps) = pattern.captures(name)
            && let Ok(n) = caps[1].parse::<u64>()
        {
            max = max.max(n);
        }
    }

    Ok(SequencedName {
        prefix: prefix.to_string(),
        number: max + 1,
    })
}

type Registry = Arc<Mutex<HashMap<(PathBuf, String), BTreeSet<u64>>>>;

/// Serialized name allocation with in-flight reservations.
#[derive(Debug, Default, Clone)]
pub struct NameSequencer {
    in_flight: Registry,
}

impl NameSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next name for `prefix` in `dir`.
    ///
    /// The number is reserved until the returned guard is dropped, so a
    /// concurrent allocation that scans before this run has written its file
    /// still moves past it.
    pub fn allocate(&self, dir: &Path, prefix: &str) -> Result<NameReservation> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

        let scanned = next_sequence(dir, prefix)?;
        let key = (dir.to_path_buf(), prefix.to_string());
        let reserved = in_flight.entry(key.clone()).or_default();
        let number = match reserved.last() {
            Some(&last) => scanned.number.max(last + 1),
            None => scanned.number,
        };
        reserved.insert(number);

        debug!(dir = %dir.display(), prefix, number, "allocated name");

        Ok(NameReservation {
            name: SequencedName {
                prefix: prefix.to_string(),
                number,
            },
            key,
            registry: Arc::clone(&self.in_flight),
        })
    }
}

/// A name held by a running download. Dropping it releases the number.
#[derive(Debug)]
pub struct NameReservation {
    name: SequencedName,
    key: (PathBuf, String),
    registry: Registry,
}

impl NameReservation {
    pub fn name(&self) -> &SequencedName {
        &self.name
    }
}

impl Drop for NameReservation {
    fn drop(&mut self) {
        let mut in_flight = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(reserved) = in_flight.get_mut(&self.key) {
            reserved.remove(&self.name.number);
            if reserved.is_empty() {
                in_flight.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn next_skips_past_highest_match() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "video3.mp4");
        touch(dir.path(), "video7.mkv");
        touch(dir.path(), "video_x.mp4");

        let name = next_sequence(dir.path(), VIDEO_PREFIX).unwrap();
        assert_eq!(name.number, 8);
        assert_eq!(name.file_name("mp4"), "video8.mp4");
    }

    #[test]
    fn empty_directory_starts_at_one() {
        let dir = TempDir::new().unwrap();
        assert_eq!(next_sequence(dir.path(), VIDEO_PREFIX).unwrap().number, 1);
    }

    #[test]
    fn missing_directory_is_created() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("downloads");

        let name = next_sequence(&nested, THUMBNAIL_PREFIX).unwrap();
        assert_eq!(name.number, 1);
        assert!(nested.is_dir());
    }

    #[test]
    fn ignores_other_prefixes_and_odd_names() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "thumbnail9.jpg");
        touch(dir.path(), "video2.part.mp4");
        touch(dir.path(), "video4");
        touch(dir.path(), "myvideo5.mp4");
        touch(dir.path(), "video1.mp4");

        assert_eq!(next_sequence(dir.path(), VIDEO_PREFIX).unwrap().number, 2);
        assert_eq!(next_sequence(dir.path(), THUMBNAIL_PREFIX).unwrap().number, 10);
    }

    #[test]
    fn prefix_is_matched_literally() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "aXb5.mp4");
        assert_eq!(next_sequence(dir.path(), "a.b").unwrap().number, 1);
    }

    #[test]
    fn reservations_prevent_duplicate_numbers() {
        let dir = TempDir::new().unwrap();
        let names = NameSequencer::new();

        let first = names.allocate(dir.path(), VIDEO_PREFIX).unwrap();
        let second = names.allocate(dir.path(), VIDEO_PREFIX).unwrap();
        assert_eq!(first.name().number, 1);
        assert_eq!(second.name().number, 2);

        drop(first);
        drop(second);

        // nothing was written, so the directory scan wins again
        let third = names.allocate(dir.path(), VIDEO_PREFIX).unwrap();
        assert_eq!(third.name().number, 1);
    }

    #[test]
    fn prefixes_have_independent_sequences() {
        let dir = TempDir::new().unwrap();
        let names = NameSequencer::new();

        let video = names.allocate(dir.path(), VIDEO_PREFIX).unwrap();
        let thumb = names.allocate(dir.path(), THUMBNAIL_PREFIX).unwrap();
        assert_eq!(video.name().number, 1);
        assert_eq!(thumb.name().number, 1);
    }

    #[test]
    fn concurrent_allocations_are_unique() {
        let dir = TempDir::new().unwrap();
        let names = NameSequencer::new();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let names = names.clone();
                let path = dir.path().to_path_buf();
                std::thread::spawn(move || names.allocate(&path, VIDEO_PREFIX).unwrap())
            })
            .collect();

        let reservations: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let numbers: BTreeSet<u64> = reservations.iter().map(|r| r.name().number).collect();
        assert_eq!(numbers.len(), 16);
        assert_eq!(numbers.first(), Some(&1));
        assert_eq!(numbers.last(), Some(&16));
    }
}
