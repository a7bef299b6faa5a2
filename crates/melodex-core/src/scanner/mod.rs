//! Incremental library synchronization.
//!
//! A scan walks the configured library directories, reconciles what it
//! finds against the track index, removes rows whose files are gone,
//! extracts tags from new and changed files and commits everything in a
//! single transaction. Progress is reported through [`ScanObserver`] and
//! a run can be stopped between units of work with a [`CancelFlag`].

pub mod artwork;
pub mod exclusion;
pub mod index;
pub mod inventory;
pub mod metadata;
pub mod scan;


use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::UNIX_EPOCH;

use serde::Serialize;
use thiserror::Error;

use crate::db::DbError;

pub use metadata::{LoftyReader, MetadataReader, TrackInfo};
pub use scan::LibraryScanner;

/// Audio formats recognized by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Flac,
    Aac,
    M4a,
    Mp3,
    Oga,
    Ogg,
    Opus,
    Ape,
    Mka,
    Wav,
    WavPack,
}

impl AudioFormat {
    /// Classifies a path by its extension, case-insensitively.
    ///
    /// Returns `None` for files the scanner does not handle.
    pub fn classify(path: &Path) -> Option<AudioFormat> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "flac" => Some(AudioFormat::Flac),
            "aac" => Some(AudioFormat::Aac),
            "m4a" => Some(AudioFormat::M4a),
            "mp3" => Some(AudioFormat::Mp3),
            "oga" => Some(AudioFormat::Oga),
            "ogg" => Some(AudioFormat::Ogg),
            "opus" => Some(AudioFormat::Opus),
            "ape" => Some(AudioFormat::Ape),
            "mka" => Some(AudioFormat::Mka),
            "wav" => Some(AudioFormat::Wav),
            "wv" => Some(AudioFormat::WavPack),
            _ => None,
        }
    }
}

/// Lifecycle stages of one scan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStage {
    Idle,
    Opening,
    LoadingIndex,
    Scanning,
    Deleting,
    Extracting,
    Pruning,
    Finishing,
    Done,
}

impl fmt::Display for ScanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanStage::Idle => "idle",
            ScanStage::Opening => "opening",
            ScanStage::LoadingIndex => "loading index",
            ScanStage::Scanning => "scanning",
            ScanStage::Deleting => "deleting",
            ScanStage::Extracting => "extracting",
            ScanStage::Pruning => "pruning",
            ScanStage::Finishing => "finishing",
            ScanStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Counters accumulated over one scan run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    /// Files queued for metadata extraction.
    pub found: usize,
    /// Files whose metadata was read and staged for commit.
    pub extracted: usize,
    /// Index rows removed because their file is gone or excluded.
    pub removed: usize,
    /// True when the run stopped at a cancellation point.
    pub cancelled: bool,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("database error: {0}")]
    Database(#[from] DbError),
}

impl From<rusqlite::Error> for ScanError {
    fn from(err: rusqlite::Error) -> Self {
        ScanError::Database(DbError::Sqlite(err))
    }
}

pub type ScanResult<T> = Result<T, ScanError>;

/// Progress callbacks delivered synchronously from the scanning thread.
///
/// Every method has an empty default body so implementors only override
/// what they care about.
pub trait ScanObserver: Send + Sync {
    /// A stage doing real work was entered.
    ///
    /// Fired for [`ScanStage::Scanning`], [`ScanStage::Extracting`] (only
    /// when there are files to extract) and [`ScanStage::Finishing`].
    fn stage_changed(&self, _stage: ScanStage) {}

    /// Running count of files queued for extraction.
    fn found_files_changed(&self, _found: usize) {}

    /// Running count of files whose tags have been read.
    fn extracted_files_changed(&self, _extracted: usize) {}

    /// The run is over. Fired exactly once on every exit path, including
    /// cancellation and errors.
    fn finished(&self) {}
}

/// Shared flag polled by the scanner between units of work.
///
/// Cancellation is cooperative: setting the flag never interrupts the
/// operation in flight, the scanner stops at its next check.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> CancelFlag {
        CancelFlag::default()
    }

    /// Requests the scan to stop at its next cancellation point.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// File modification time in nanoseconds since the Unix epoch, when the
/// filesystem reports one.
pub(crate) fn file_mtime_ns(path: &Path) -> Option<i64> {
    let metadata = std::fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    let duration = modified.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(duration.as_nanos()).ok()
}
