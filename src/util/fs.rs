//! Filesystem checks used by the playlist and config reload paths.

use std::path::Path;
use std::time::SystemTime;
use tracing::warn;

/// Modification time of a file, or None when it cannot be stat'ed.
pub fn mtime(path: &Path) -> Option<SystemTime> {
    match std::fs::metadata(path) {
        Ok(meta) => meta.modified().ok(),
        Err(e) => {
            warn!("could not stat {}: {}", path.display(), e);
            None
        }
    }
}

/// Whether `path` is a regular file we can open for reading.
///
/// Playlists routinely reference files on network storage that come and
/// go; callers treat a `false` here as "skip and move on".
pub fn is_readable_file(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => std::fs::File::open(path).is_ok(),
        Ok(_) => {
            warn!("not a regular file: {}", path.display());
            false
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn readable_file_accepts_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.mp3");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"x")
            .unwrap();
        assert!(is_readable_file(&path));
    }

    #[test]
    fn readable_file_rejects_missing_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_readable_file(&dir.path().join("nope.mp3")));
        assert!(!is_readable_file(dir.path()));
    }

    #[test]
    fn mtime_of_missing_file_is_none() {
        assert!(mtime(Path::new("/definitely/not/here")).is_none());
    }
}
