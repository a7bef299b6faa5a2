//! In-memory view of the stored track index.
//!
//! Built once per scan from the `tracks` table. Classifies every stored
//! row as kept or removable, and collects per-directory art state the
//! inventory pass reconciles against the filesystem.

use std::collections::HashMap;
use std::path::Path;

use super::exclusion::{path_under_any, NoMediaCache};
use super::CancelFlag;
use crate::db::TrackRow;

/// What the index knows about one kept track.
#[derive(Debug, Clone)]
pub struct ExistingTrack {
    pub id: i64,
    pub mtime_ns: Option<i64>,
    /// The stored embedded art path no longer exists on disk; the track
    /// is eligible for art self-healing even when the file is unchanged.
    pub embedded_art_missing: bool,
}

/// Index state the scanner reconciles against the filesystem walk.
#[derive(Debug, Default)]
pub struct ExistingIndex {
    pub tracks_by_path: HashMap<String, ExistingTrack>,
    /// Stored directory art per directory. The first row of a directory
    /// wins; rows are ordered by id, so that is the oldest track.
    pub art_by_directory: HashMap<String, Option<String>>,
    pub tracks_to_remove: Vec<i64>,
}

impl ExistingIndex {
    /// Classify stored rows against the current configuration.
    ///
    /// A row is marked for removal when its file is gone or not a
    /// regular readable file, when it lies outside every library root,
    /// when it is blacklisted, or when its directory carries a
    /// `.nomedia` marker. Everything else lands in `tracks_by_path`.
    pub fn build(
        rows: Vec<TrackRow>,
        roots: &[String],
        blacklist: &[String],
        nomedia: &mut NoMediaCache,
        cancel: &CancelFlag,
    ) -> ExistingIndex {
        let mut index = ExistingIndex::default();
        let mut art_present: HashMap<String, bool> = HashMap::new();

        for row in rows {
            if cancel.is_cancelled() {
                break;
            }

            let readable_file = std::fs::File::open(&row.filepath)
                .and_then(|f| f.metadata())
                .map(|m| m.is_file())
                .unwrap_or(false);
            if !readable_file
                || !path_under_any(&row.filepath, roots)
                || path_under_any(&row.filepath, blacklist)
            {
                index.tracks_to_remove.push(row.id);
                continue;
            }

            let Some(dir) = Path::new(&row.filepath)
                .parent()
                .and_then(Path::to_str)
                .map(str::to_string)
            else {
                index.tracks_to_remove.push(row.id);
                continue;
            };
            if nomedia.is_no_media_dir(&dir) {
                index.tracks_to_remove.push(row.id);
                continue;
            }

            index.art_by_directory.entry(dir).or_insert_with(|| row.directory_art.clone());

            let embedded_art_missing = match &row.embedded_art {
                Some(art) => !*art_present
                    .entry(art.clone())
                    .or_insert_with(|| Path::new(art).is_file()),
                None => false,
            };

            index.tracks_by_path.insert(
                row.filepath,
                ExistingTrack {
                    id: row.id,
                    mtime_ns: row.file_mtime_ns,
                    embedded_art_missing,
                },
            );
        }

        index
    }
}
