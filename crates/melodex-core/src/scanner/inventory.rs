//! Filesystem walk over the library roots.
//!
//! Compares every audio file against the stored index: new files and
//! files with a changed modification time are queued for extraction,
//! unchanged files are left alone apart from two repairs done in place.
//! On entering a directory its cover image is resolved once and checked
//! against what the index stored; on mismatch all tracks under that
//! directory are repointed in one UPDATE. Unchanged tracks whose cached
//! embedded art file has been deleted get their picture re-extracted.

use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::artwork::{find_directory_art, ArtworkStore, DirectoryArtCache};
use super::exclusion::{path_under_any, NoMediaCache};
use super::index::ExistingIndex;
use super::metadata::MetadataReader;
use super::{file_mtime_ns, AudioFormat, CancelFlag, ScanObserver};
use crate::db::library::{update_directory_art_by_prefix, update_embedded_art};

/// A file queued for metadata extraction.
#[derive(Debug, Clone)]
pub struct TrackToAdd {
    pub filepath: String,
    /// Directory art resolved while walking, stored with the new row.
    pub directory_art: Option<String>,
    pub format: AudioFormat,
}

/// One walk over all library roots. Construct, then call [`run`].
///
/// [`run`]: InventoryPass::run
pub struct InventoryPass<'a> {
    pub(crate) conn: &'a Connection,
    pub(crate) index: &'a mut ExistingIndex,
    pub(crate) roots: &'a [String],
    pub(crate) blacklist: &'a [String],
    pub(crate) nomedia: &'a mut NoMediaCache,
    pub(crate) reader: &'a dyn MetadataReader,
    pub(crate) art_store: &'a mut ArtworkStore,
    pub(crate) observer: &'a dyn ScanObserver,
    pub(crate) cancel: &'a CancelFlag,
    pub(crate) art_cache: DirectoryArtCache,
    pub(crate) to_add: Vec<TrackToAdd>,
    current_directory: Option<String>,
    current_directory_art: Option<String>,
}

impl<'a> InventoryPass<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conn: &'a Connection,
        index: &'a mut ExistingIndex,
        roots: &'a [String],
        blacklist: &'a [String],
        nomedia: &'a mut NoMediaCache,
        reader: &'a dyn MetadataReader,
        art_store: &'a mut ArtworkStore,
        observer: &'a dyn ScanObserver,
        cancel: &'a CancelFlag,
    ) -> InventoryPass<'a> {
        InventoryPass {
            conn,
            index,
            roots,
            blacklist,
            nomedia,
            reader,
            art_store,
            observer,
            cancel,
            art_cache: DirectoryArtCache::new(),
            to_add: Vec::new(),
            current_directory: None,
            current_directory_art: None,
        }
    }

    /// Walk every root and return the files queued for extraction.
    pub fn run(mut self) -> Vec<TrackToAdd> {
        let roots = self.roots;
        for root in roots {
            if self.cancel.is_cancelled() {
                break;
            }
            self.walk_root(root);
        }
        self.to_add
    }

    fn walk_root(&mut self, root: &str) {
        for entry in WalkDir::new(root).follow_links(true) {
            if self.cancel.is_cancelled() {
                return;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("error walking {root}: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(filepath) = entry.path().to_str() else {
                debug!("skipping non-UTF-8 path {}", entry.path().display());
                continue;
            };
            let Some(format) = AudioFormat::classify(entry.path()) else {
                continue;
            };
            let Some(dir) = entry.path().parent().and_then(Path::to_str) else {
                continue;
            };

            self.enter_directory(dir);
            self.reconcile_file(filepath, dir, format);
        }
    }

    /// Resolve directory art once per directory and repair stored rows
    /// that disagree with what is on disk now.
    fn enter_directory(&mut self, dir: &str) {
        if self.current_directory.as_deref() == Some(dir) {
            return;
        }
        self.current_directory = Some(dir.to_string());
        self.current_directory_art = find_directory_art(&mut self.art_cache, dir);

        if let Some(stored) = self.index.art_by_directory.get(dir) {
            if *stored != self.current_directory_art {
                let prefix = format!("{dir}/");
                if let Err(e) = update_directory_art_by_prefix(
                    self.conn,
                    self.current_directory_art.as_deref(),
                    &prefix,
                ) {
                    warn!("failed to update directory art under {dir}: {e}");
                }
            }
            // handled; later files in this directory hit the guard above
            self.index.art_by_directory.remove(dir);
        }
    }

    fn reconcile_file(&mut self, filepath: &str, dir: &str, format: AudioFormat) {
        match self.index.tracks_by_path.get(filepath) {
            None => {
                // New file. Stored tracks were filtered during index
                // build; exclusions apply here for the first time.
                if path_under_any(filepath, self.blacklist) || self.nomedia.is_no_media_dir(dir) {
                    return;
                }
                self.queue(filepath, format);
            }
            Some(existing) => {
                if file_mtime_ns(Path::new(filepath)) == existing.mtime_ns {
                    if existing.embedded_art_missing {
                        self.restore_embedded_art(filepath, format, existing.id);
                    }
                } else {
                    // Changed on disk: replace the row wholesale
                    self.index.tracks_to_remove.push(existing.id);
                    self.queue(filepath, format);
                }
            }
        }
    }

    fn queue(&mut self, filepath: &str, format: AudioFormat) {
        self.to_add.push(TrackToAdd {
            filepath: filepath.to_string(),
            directory_art: self.current_directory_art.clone(),
            format,
        });
        self.observer.found_files_changed(self.to_add.len());
    }

    /// Re-extract the picture of an otherwise unchanged track. The row
    /// is updated even when no picture can be recovered, so the index
    /// stops pointing at a file that is gone.
    fn restore_embedded_art(&mut self, filepath: &str, format: AudioFormat, track_id: i64) {
        let art = self
            .reader
            .read(Path::new(filepath), format)
            .and_then(|info| info.art_data)
            .and_then(|data| self.art_store.save_embedded(&data));
        if let Err(e) = update_embedded_art(self.conn, track_id, art.as_deref()) {
            warn!("failed to restore embedded art for {filepath}: {e}");
        }
    }
}
