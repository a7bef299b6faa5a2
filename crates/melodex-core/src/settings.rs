//! Library configuration: root directories and blacklist.
//!
//! Directory lists are normalized before a scan so that path membership
//! can be decided with plain string-prefix checks: every entry ends with
//! a slash, duplicates are dropped, and entries already covered by a
//! listed ancestor are removed.

use serde::{Deserialize, Serialize};

/// Directories the scanner crawls and directories it must skip.
///
/// Both lists are taken as configured; [`LibrarySettings::normalized`] is
/// applied once at scan start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibrarySettings {
    pub library_directories: Vec<String>,
    pub blacklisted_directories: Vec<String>,
}

impl LibrarySettings {
    /// Returns a copy with both directory lists normalized.
    pub fn normalized(&self) -> LibrarySettings {
        LibrarySettings {
            library_directories: normalize_directories(&self.library_directories),
            blacklisted_directories: normalize_directories(&self.blacklisted_directories),
        }
    }
}

/// Normalizes a directory list for prefix matching.
///
/// Appends a trailing slash to each entry, removes duplicates keeping the
/// first occurrence, and drops entries nested under another listed entry.
/// Empty strings are ignored.
pub fn normalize_directories(dirs: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(dirs.len());
    for dir in dirs {
        if dir.is_empty() {
            continue;
        }
        let mut dir = dir.clone();
        if !dir.ends_with('/') {
            dir.push('/');
        }
        if !normalized.contains(&dir) {
            normalized.push(dir);
        }
    }

    let snapshot = normalized.clone();
    normalized.retain(|dir| {
        !snapshot
            .iter()
            .any(|other| other != dir && dir.starts_with(other.as_str()))
    });
    normalized
}
