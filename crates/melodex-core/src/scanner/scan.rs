//! The scan orchestrator.
//!
//! One run proceeds through opening, index load, filesystem walk,
//! deletion, extraction, pruning and commit. Every database write
//! happens inside a single transaction opened at the start; an error or
//! cancellation anywhere drops the transaction and the index is exactly
//! what it was before the run. Cancellation is polled between stages and
//! between units of work inside the long stages, and reports success
//! with `cancelled` set rather than an error.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rusqlite::Connection;
use tracing::{info, warn};

use super::artwork::ArtworkStore;
use super::exclusion::NoMediaCache;
use super::index::ExistingIndex;
use super::inventory::InventoryPass;
use super::metadata::MetadataReader;
use super::{file_mtime_ns, CancelFlag, ScanObserver, ScanResult, ScanStage, ScanStats};
use crate::db::entities::TrackAdder;
use crate::db::library::{
    delete_tracks_chunk, get_track_rows, referenced_art_paths, remove_unused_entities,
};
use crate::db::models::NewTrack;
use crate::db::{Database, DbResult, MAX_BOUND_VARIABLES};
use crate::settings::LibrarySettings;

/// Fires `finished` when dropped. Declared first in `run` so it outlives
/// the transaction and fires on every exit path exactly once.
struct FinishedGuard<'a> {
    observer: &'a dyn ScanObserver,
}

impl Drop for FinishedGuard<'_> {
    fn drop(&mut self) {
        self.observer.finished();
    }
}

/// A single library synchronization run.
///
/// The scanner borrows its collaborators and is consumed by [`run`];
/// keep a clone of [`cancel_flag`] around to stop it from another
/// thread.
///
/// [`run`]: LibraryScanner::run
/// [`cancel_flag`]: LibraryScanner::cancel_flag
pub struct LibraryScanner<'a> {
    db: &'a Database,
    settings: LibrarySettings,
    media_art_directory: PathBuf,
    reader: &'a dyn MetadataReader,
    observer: &'a dyn ScanObserver,
    cancel: CancelFlag,
}

impl<'a> LibraryScanner<'a> {
    pub fn new(
        db: &'a Database,
        settings: LibrarySettings,
        media_art_directory: PathBuf,
        reader: &'a dyn MetadataReader,
        observer: &'a dyn ScanObserver,
    ) -> LibraryScanner<'a> {
        LibraryScanner {
            db,
            settings,
            media_art_directory,
            reader,
            observer,
            cancel: CancelFlag::new(),
        }
    }

    /// The flag that stops this run. Clones share state.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Replaces the scanner's own flag with one the caller already
    /// hands out elsewhere.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> LibraryScanner<'a> {
        self.cancel = cancel;
        self
    }

    /// Run the scan to completion, cancellation or error.
    pub fn run(self) -> ScanResult<ScanStats> {
        let _finished = FinishedGuard {
            observer: self.observer,
        };
        let mut stats = ScanStats::default();

        if self.cancelled_at(ScanStage::Idle, &mut stats) {
            return Ok(stats);
        }

        info!("start updating database");
        let started = Instant::now();

        let settings = self.settings.normalized();
        let mut conn = self.db.conn()?;
        let tx = conn.transaction()?;

        if self.cancelled_at(ScanStage::Opening, &mut stats) {
            return Ok(stats);
        }

        if let Err(e) = std::fs::create_dir_all(&self.media_art_directory) {
            warn!(
                "failed to create media art directory {}: {}",
                self.media_art_directory.display(),
                e
            );
        }
        let mut art_store = ArtworkStore::open(&self.media_art_directory);

        let loading = Instant::now();
        let rows = get_track_rows(&tx)?;
        info!("tracks in database: {}, loaded in {:?}", rows.len(), loading.elapsed());

        let mut nomedia = NoMediaCache::new();
        let mut index = ExistingIndex::build(
            rows,
            &settings.library_directories,
            &settings.blacklisted_directories,
            &mut nomedia,
            &self.cancel,
        );

        if self.cancelled_at(ScanStage::LoadingIndex, &mut stats) {
            return Ok(stats);
        }

        self.observer.stage_changed(ScanStage::Scanning);
        let scanning = Instant::now();
        let to_add = InventoryPass::new(
            &tx,
            &mut index,
            &settings.library_directories,
            &settings.blacklisted_directories,
            &mut nomedia,
            self.reader,
            &mut art_store,
            self.observer,
            &self.cancel,
        )
        .run();
        stats.found = to_add.len();
        info!("found files: {}, scanned in {:?}", to_add.len(), scanning.elapsed());

        if self.cancelled_at(ScanStage::Scanning, &mut stats) {
            return Ok(stats);
        }

        if !index.tracks_to_remove.is_empty() {
            let deleting = Instant::now();
            stats.removed = delete_in_chunks(&tx, &index.tracks_to_remove, &self.cancel)?;
            info!("removed tracks: {}, in {:?}", stats.removed, deleting.elapsed());
        }

        if self.cancelled_at(ScanStage::Deleting, &mut stats) {
            return Ok(stats);
        }

        if !to_add.is_empty() {
            self.observer.stage_changed(ScanStage::Extracting);
            let extracting = Instant::now();
            let mut adder = TrackAdder::new(&tx)?;

            for file in &to_add {
                if self.cancel.is_cancelled() {
                    break;
                }
                let Some(mut track_info) = self.reader.read(Path::new(&file.filepath), file.format)
                else {
                    continue;
                };

                // Untagged files enter the library under their file name
                if track_info.title.is_empty() {
                    track_info.title = Path::new(&file.filepath)
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or(&file.filepath)
                        .to_string();
                }

                let embedded_art = track_info
                    .art_data
                    .take()
                    .and_then(|data| art_store.save_embedded(&data));

                // The mtime is read again here, after extraction: if the
                // file changed while this scan ran, the next scan sees a
                // mismatch and picks it up
                adder.add_track(NewTrack {
                    filepath: file.filepath.clone(),
                    file_mtime_ns: file_mtime_ns(Path::new(&file.filepath)),
                    title: track_info.title,
                    artists: track_info.artists,
                    album_artists: track_info.album_artists,
                    albums: track_info.albums,
                    genres: track_info.genres,
                    year: track_info.year,
                    track_number: track_info.track_number,
                    disc_number: track_info.disc_number,
                    duration: track_info.duration,
                    directory_art: file.directory_art.clone(),
                    embedded_art,
                });

                stats.extracted += 1;
                self.observer.extracted_files_changed(stats.extracted);
            }
            info!(
                "extracted files: {}, in {:?}",
                stats.extracted,
                extracting.elapsed()
            );
        }

        if self.cancelled_at(ScanStage::Extracting, &mut stats) {
            return Ok(stats);
        }

        if let Err(e) = remove_unused_entities(&tx) {
            warn!("failed to remove unused artists, albums and genres: {e}");
        }
        match referenced_art_paths(&tx) {
            Ok(referenced) => art_store.remove_unused_files(&referenced, &self.cancel),
            Err(e) => warn!("failed to query referenced media art: {e}"),
        }

        if self.cancelled_at(ScanStage::Pruning, &mut stats) {
            return Ok(stats);
        }

        self.observer.stage_changed(ScanStage::Finishing);
        tx.commit()?;

        info!("library update finished in {:?}", started.elapsed());
        Ok(stats)
    }

    /// Cancellation checkpoint. Returning from the caller with the
    /// transaction unfinished rolls everything back.
    fn cancelled_at(&self, stage: ScanStage, stats: &mut ScanStats) -> bool {
        if self.cancel.is_cancelled() {
            info!("scan stopped during {stage}");
            stats.cancelled = true;
            true
        } else {
            false
        }
    }
}

/// Delete queued track ids in chunks sized to the statement variable
/// limit. Polls for cancellation before each chunk and returns the
/// number of rows actually deleted.
pub(crate) fn delete_in_chunks(
    conn: &Connection,
    ids: &[i64],
    cancel: &CancelFlag,
) -> DbResult<usize> {
    let mut removed = 0;
    for chunk in ids.chunks(MAX_BOUND_VARIABLES) {
        if cancel.is_cancelled() {
            break;
        }
        removed += delete_tracks_chunk(conn, chunk)?;
    }
    Ok(removed)
}
