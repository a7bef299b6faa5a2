//! Row types returned by the query layer.

use serde::{Deserialize, Serialize};

/// A full track row.
///
/// `directory_art` and `embedded_art` hold filesystem paths: a cover
/// image found next to the file, and the extracted picture written to
/// the media-art cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: i64,
    pub filepath: String,
    pub file_mtime_ns: Option<i64>,
    pub title: String,
    pub year: Option<i32>,
    pub track_number: Option<i32>,
    pub disc_number: Option<String>,
    pub duration: Option<f64>,
    pub directory_art: Option<String>,
    pub embedded_art: Option<String>,
}

/// The slice of a track row the scanner loads to decide whether a file
/// is new, changed or gone.
#[derive(Debug, Clone)]
pub struct TrackRow {
    pub id: i64,
    pub filepath: String,
    pub file_mtime_ns: Option<i64>,
    pub directory_art: Option<String>,
    pub embedded_art: Option<String>,
}

/// A track staged for insertion, with its tag values still as titles.
///
/// The entity layer resolves the title lists to artist, album and genre
/// ids when the track is added.
#[derive(Debug, Clone, Default)]
pub struct NewTrack {
    pub filepath: String,
    pub file_mtime_ns: Option<i64>,
    pub title: String,
    pub artists: Vec<String>,
    pub album_artists: Vec<String>,
    pub albums: Vec<String>,
    pub genres: Vec<String>,
    pub year: Option<i32>,
    pub track_number: Option<i32>,
    pub disc_number: Option<String>,
    pub duration: Option<f64>,
    pub directory_art: Option<String>,
    pub embedded_art: Option<String>,
}

/// Aggregate counts over one library database.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LibraryStats {
    pub tracks: i64,
    pub artists: i64,
    pub albums: i64,
    pub genres: i64,
    /// Sum of known track durations, in seconds.
    pub total_duration: f64,
}
