//! Directory exclusion rules.
//!
//! Directories are excluded when blacklisted or marked with a `.nomedia`
//! file. Membership tests work on normalized directory strings (slash
//! terminated), so they reduce to string prefix checks.

use std::collections::HashMap;
use std::path::Path;

/// Memoized `.nomedia` lookups.
///
/// One filesystem probe per distinct directory per scan; the result is
/// held for the rest of the run even if the marker changes underneath.
#[derive(Debug, Default)]
pub struct NoMediaCache {
    checked: HashMap<String, bool>,
}

impl NoMediaCache {
    pub fn new() -> NoMediaCache {
        NoMediaCache::default()
    }

    /// True when `dir` contains a `.nomedia` marker file.
    pub fn is_no_media_dir(&mut self, dir: &str) -> bool {
        if let Some(&no_media) = self.checked.get(dir) {
            return no_media;
        }
        let no_media = Path::new(dir).join(".nomedia").is_file();
        self.checked.insert(dir.to_string(), no_media);
        no_media
    }
}

/// True when `path` lies under any of `dirs`.
///
/// `dirs` must be slash-terminated, as produced by
/// [`crate::settings::normalize_directories`].
pub fn path_under_any(path: &str, dirs: &[String]) -> bool {
    dirs.iter().any(|dir| path.starts_with(dir.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_no_media_marker_detected() {
        let dir = tempfile::tempdir().unwrap();
        let marked = dir.path().join("marked");
        let plain = dir.path().join("plain");
        fs::create_dir_all(&marked).unwrap();
        fs::create_dir_all(&plain).unwrap();
        fs::write(marked.join(".nomedia"), b"").unwrap();

        let mut cache = NoMediaCache::new();
        assert!(cache.is_no_media_dir(marked.to_str().unwrap()));
        assert!(!cache.is_no_media_dir(plain.to_str().unwrap()));
    }

    #[test]
    fn test_no_media_result_is_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let marked = dir.path().join("marked");
        fs::create_dir_all(&marked).unwrap();
        let marker = marked.join(".nomedia");
        fs::write(&marker, b"").unwrap();

        let mut cache = NoMediaCache::new();
        assert!(cache.is_no_media_dir(marked.to_str().unwrap()));

        // removing the marker mid-scan does not change the cached answer
        fs::remove_file(&marker).unwrap();
        assert!(cache.is_no_media_dir(marked.to_str().unwrap()));
    }

    #[test]
    fn test_path_under_any_uses_prefixes() {
        let dirs = vec!["/music/".to_string(), "/podcasts/".to_string()];
        assert!(path_under_any("/music/album/track.mp3", &dirs));
        assert!(path_under_any("/podcasts/show.mp3", &dirs));
        assert!(!path_under_any("/music2/track.mp3", &dirs));
        assert!(!path_under_any("/video/clip.mp3", &dirs));
    }
}
