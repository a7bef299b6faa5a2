//! Core library for melodex: a SQLite-backed music library index and
//! the scanner that keeps it in sync with the filesystem.
//!
//! The [`db`] module owns the schema and all queries, [`scanner`] walks
//! the configured directories and reconciles them against the index in
//! a single transaction, and [`settings`] describes which directories
//! take part.

pub mod db;
pub mod scanner;
pub mod settings;

pub use db::{Database, DbError, DbResult, LibraryStats, Track};
pub use scanner::{
    CancelFlag, LibraryScanner, LoftyReader, MetadataReader, ScanError, ScanObserver, ScanResult,
    ScanStage, ScanStats, TrackInfo,
};
pub use settings::LibrarySettings;
