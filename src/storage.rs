//! Files in the downloads directory: cleanup, verification and lookup.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{GrabError, Result};

/// Extensions a finished media download may carry.
pub const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mp3", "m4a"];

/// Extensions a finished thumbnail may carry.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Whether `name` belongs to the run that allocated `base`.
///
/// Matches `{base}.anything` so that `video1` never claims `video10.mp4`.
fn owned_by(name: &str, base: &str) -> bool {
    name.strip_prefix(base).is_some_and(|rest| rest.starts_with('.'))
}

/// An extension is usable in a stored file name.
pub fn is_safe_extension(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Delete every file in `dir` owned by `base`. Returns how many were removed.
pub fn remove_with_prefix(dir: &Path, base: &str) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cleanup: cannot list directory");
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !owned_by(name, base) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!(file = name, "cleanup: removed partial artifact");
                removed += 1;
            }
            Err(e) => warn!(file = name, error = %e, "cleanup: failed to remove"),
        }
    }
    removed
}

/// Find the finished artifact for `base`.
///
/// `{base}.{preferred}` is checked first; otherwise any non-empty file owned
/// by `base` with one of the `accepted` extensions.
pub fn find_artifact(dir: &Path, base: &str, preferred: &str, accepted: &[&str]) -> Result<String> {
    let preferred_name = format!("{base}.{preferred}");
    if is_non_empty(&dir.join(&preferred_name)) {
        return Ok(preferred_name);
    }

    let entries = fs::read_dir(dir).map_err(|e| GrabError::io(dir, e))?;
    let mut candidates: Vec<String> = entries
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| owned_by(name, base))
        .filter(|name| {
            Path::new(name)
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| accepted.iter().any(|a| a.eq_ignore_ascii_case(e)))
        })
        .filter(|name| is_non_empty(&dir.join(name)))
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| GrabError::MissingOutput(base.to_string()))
}

fn is_non_empty(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

/// Resolve a stored file for retrieval.
///
/// Only bare file names are accepted; anything that could escape `dir` is
/// rejected as invalid input.
pub fn locate(dir: &Path, filename: &str) -> Result<PathBuf> {
    let is_plain = !filename.is_empty()
        && !filename.starts_with('.')
        && sanitize_filename::is_sanitized(filename)
        && Path::new(filename).file_name().and_then(|n| n.to_str()) == Some(filename);
    if !is_plain {
        return Err(GrabError::InvalidName(filename.to_string()));
    }

    let path = dir.join(filename);
    if path.is_file() {
        Ok(path)
    } else {
        Err(GrabError::FileNotFound(filename.to_string()))
    }
}

/// Removes the artifacts of a run on drop unless disarmed.
///
/// Covers failures, timeouts and callers dropping the future mid-stream.
#[derive(Debug)]
pub struct ArtifactGuard {
    dir: PathBuf,
    base: String,
    armed: bool,
}

impl ArtifactGuard {
    pub fn new(dir: &Path, base: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            base: base.to_string(),
            armed: true,
        }
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if self.armed {
            let removed = remove_with_prefix(&self.dir, &self.base);
            if removed > 0 {
                debug!(base = %self.base, removed, "cleaned up after failed run");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, body: &[u8]) {
        fs::write(dir.join(name), body).unwrap();
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn remove_only_touches_owned_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "video1.mp4", b"a");
        write(dir.path(), "video1.f137.mp4.part", b"a");
        write(dir.path(), "video1.webm", b"a");
        write(dir.path(), "video10.mp4", b"a");
        write(dir.path(), "thumbnail1.jpg", b"a");

        assert_eq!(remove_with_prefix(dir.path(), "video1"), 3);
        assert_eq!(names(dir.path()), vec!["thumbnail1.jpg", "video10.mp4"]);
    }

    #[test]
    fn find_prefers_predicted_name() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "video2.mkv", b"data");
        write(dir.path(), "video2.mp4", b"data");

        let found = find_artifact(dir.path(), "video2", "mp4", MEDIA_EXTENSIONS).unwrap();
        assert_eq!(found, "video2.mp4");
    }

    #[test]
    fn find_falls_back_to_accepted_extensions() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "video2.mp4", b"");
        write(dir.path(), "video2.info.json", b"{}");
        write(dir.path(), "video2.webm", b"data");

        let found = find_artifact(dir.path(), "video2", "mp4", MEDIA_EXTENSIONS).unwrap();
        assert_eq!(found, "video2.webm");
    }

    #[test]
    fn find_reports_missing_output() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "video2.mp4", b"");

        let err = find_artifact(dir.path(), "video2", "mp4", MEDIA_EXTENSIONS).unwrap_err();
        assert!(matches!(err, GrabError::MissingOutput(_)));
    }

    #[test]
    fn guard_cleans_unless_disarmed() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "video1.mp4", b"partial");
        write(dir.path(), "video2.mp4", b"done");

        drop(ArtifactGuard::new(dir.path(), "video1"));

        let mut kept = ArtifactGuard::new(dir.path(), "video2");
        kept.disarm();
        drop(kept);

        assert_eq!(names(dir.path()), vec!["video2.mp4"]);
    }

    #[test]
    fn locate_existing_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "video1.mp4", b"data");
        assert_eq!(
            locate(dir.path(), "video1.mp4").unwrap(),
            dir.path().join("video1.mp4")
        );
    }

    #[test]
    fn locate_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = locate(dir.path(), "video9.mp4").unwrap_err();
        assert!(matches!(err, GrabError::FileNotFound(_)));
    }

    #[test]
    fn locate_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        for name in ["../secret", "..", ".", "", "a/b.mp4", "a\\b.mp4", ".hidden"] {
            let err = locate(dir.path(), name).unwrap_err();
            assert!(matches!(err, GrabError::InvalidName(_)), "{name:?}");
        }
    }

    #[test]
    fn safe_extensions() {
        assert!(is_safe_extension("mp4"));
        assert!(is_safe_extension("m4a"));
        assert!(!is_safe_extension(""));
        assert!(!is_safe_extension("../x"));
        assert!(!is_safe_extension("mp4 "));
    }
}
