//! Cover art resolution.
//!
//! Two sources of artwork exist: image files sitting next to the audio
//! files (cover.jpg, folder.jpg, etc.) and pictures embedded in tags.
//! Directory lookups are memoized per scan. Embedded pictures are written
//! to a cache directory under a content-hash name, so identical images
//! shared by many tracks are stored once.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::CancelFlag;

/// Standard filenames to look for folder artwork (case-insensitive)
pub const ARTWORK_FILENAMES: &[&str] = &[
    "cover.jpg",
    "cover.jpeg",
    "cover.png",
    "folder.jpg",
    "folder.jpeg",
    "folder.png",
    "album.jpg",
    "album.jpeg",
    "album.png",
    "front.jpg",
    "front.jpeg",
    "front.png",
    "artwork.jpg",
    "artwork.jpeg",
    "artwork.png",
];

/// Per-scan memo of directory art lookups, keyed by directory path.
pub type DirectoryArtCache = HashMap<String, Option<String>>;

/// Find the cover image for a directory, memoized.
///
/// `None` results are cached too; a directory without art is probed once
/// per scan.
pub fn find_directory_art(cache: &mut DirectoryArtCache, dir: &str) -> Option<String> {
    if let Some(found) = cache.get(dir) {
        return found.clone();
    }
    let found = resolve_directory_art(dir);
    cache.insert(dir.to_string(), found.clone());
    found
}

fn resolve_directory_art(dir: &str) -> Option<String> {
    // Try exact filenames first
    for filename in ARTWORK_FILENAMES {
        let candidate = format!("{dir}/{filename}");
        if Path::new(&candidate).is_file() {
            return Some(candidate);
        }
    }

    let entries: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect(),
        Err(_) => return None,
    };

    // Case-insensitive pass over the same priority list
    let mut best: Option<(usize, &String)> = None;
    for name in &entries {
        let lower = name.to_lowercase();
        if let Some(priority) = ARTWORK_FILENAMES.iter().position(|f| *f == lower) {
            if best.map(|(current, _)| priority < current).unwrap_or(true) {
                best = Some((priority, name));
            }
        }
    }
    if let Some((_, name)) = best {
        return Some(format!("{dir}/{name}"));
    }

    // Any image file, lexicographically first
    let mut images: Vec<&String> = entries
        .iter()
        .filter(|name| {
            let lower = name.to_lowercase();
            lower.ends_with(".jpg") || lower.ends_with(".jpeg") || lower.ends_with(".png")
        })
        .collect();
    images.sort();
    images.first().map(|name| format!("{dir}/{name}"))
}

/// Content-addressed cache of embedded pictures.
///
/// Files are named `<sha256>-embedded.<ext>`; opening the store lists the
/// cache directory once so pictures already extracted by earlier scans
/// are found without hashing anything twice.
pub struct ArtworkStore {
    directory: PathBuf,
    by_hash: HashMap<String, String>,
}

impl ArtworkStore {
    /// Open the store over `directory`, seeding the hash index from the
    /// files already present.
    pub fn open(directory: &Path) -> ArtworkStore {
        let mut by_hash = HashMap::new();
        match fs::read_dir(directory) {
            Ok(entries) => {
                for entry in entries.filter_map(|e| e.ok()) {
                    let name = entry.file_name();
                    let Some(name) = name.to_str() else { continue };
                    let Some((hash, _)) = name.split_once("-embedded.") else {
                        continue;
                    };
                    let path = entry.path();
                    if let Some(path) = path.to_str() {
                        by_hash.insert(hash.to_string(), path.to_string());
                    }
                }
            }
            Err(err) => {
                debug!("media art directory not listable: {err}");
            }
        }
        ArtworkStore {
            directory: directory.to_path_buf(),
            by_hash,
        }
    }

    /// Write an embedded picture to the cache and return its path.
    ///
    /// Returns `None` for empty data, unrecognized image formats and
    /// write failures; callers treat all three as "no art". Identical
    /// bytes always map to the same file.
    pub fn save_embedded(&mut self, data: &[u8]) -> Option<String> {
        if data.is_empty() {
            return None;
        }

        let hash = format!("{:x}", Sha256::digest(data));
        if let Some(existing) = self.by_hash.get(&hash) {
            return Some(existing.clone());
        }

        let Some(extension) = image_extension(data) else {
            debug!("embedded picture with unrecognized format, skipping");
            return None;
        };

        let path = self.directory.join(format!("{hash}-embedded.{extension}"));
        let path_str = path.to_str()?.to_string();
        if let Err(err) = fs::write(&path, data) {
            warn!("failed to write media art file {}: {}", path.display(), err);
            return None;
        }
        self.by_hash.insert(hash, path_str.clone());
        Some(path_str)
    }

    /// Delete cache files not in `referenced`.
    ///
    /// Best effort; failures are logged and skipped. Checked against the
    /// cancel flag between files.
    pub fn remove_unused_files(&self, referenced: &HashSet<String>, cancel: &CancelFlag) {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries.filter_map(|e| e.ok()) {
            if cancel.is_cancelled() {
                return;
            }
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let path = entry.path();
            let keep = path.to_str().map(|p| referenced.contains(p)).unwrap_or(false);
            if !keep {
                if let Err(err) = fs::remove_file(&path) {
                    warn!("failed to remove unused media art {}: {}", path.display(), err);
                }
            }
        }
    }
}

/// Image format sniffing from magic bytes.
fn image_extension(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8]) {
        Some("jpg")
    } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some("png")
    } else if data.starts_with(b"GIF8") {
        Some("gif")
    } else if data.starts_with(b"BM") {
        Some("bmp")
    } else {
        None
    }
}
