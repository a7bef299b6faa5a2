//! Tag extraction using lofty.
//!
//! Multi-valued tags (artists, album artists, albums, genres) are kept
//! as lists. Genre values are additionally split on common separator
//! characters, since many taggers store "Rock; Blues" as one value.

use std::path::Path;

use lofty::picture::PictureType;
use lofty::prelude::*;
use lofty::probe::Probe;
use tracing::debug;

use super::AudioFormat;

/// Characters treated as separators inside a single genre value.
const GENRE_SEPARATORS: [char; 5] = [';', ',', '/', '|', '\0'];

/// Tags and properties read from one audio file.
///
/// An empty `title` is allowed here; the scanner substitutes the file
/// name before the track reaches the database.
#[derive(Debug, Clone, Default)]
pub struct TrackInfo {
    pub title: String,
    pub artists: Vec<String>,
    pub album_artists: Vec<String>,
    pub albums: Vec<String>,
    pub genres: Vec<String>,
    pub year: Option<i32>,
    pub track_number: Option<i32>,
    /// Disc number as written in the tag, e.g. "1" or "1/2".
    pub disc_number: Option<String>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// Raw bytes of the front cover picture, when embedded.
    pub art_data: Option<Vec<u8>>,
}

/// Reads tags from audio files.
///
/// The scanner only talks to this trait, so tests can substitute canned
/// metadata without touching real audio files.
pub trait MetadataReader: Send + Sync {
    /// Read tags from `path`.
    ///
    /// `None` means the file could not be parsed; such files never enter
    /// the library. A parseable file without any tag still yields a
    /// (mostly empty) `TrackInfo`.
    fn read(&self, path: &Path, format: AudioFormat) -> Option<TrackInfo>;
}

/// Tag reader backed by lofty.
#[derive(Debug, Default)]
pub struct LoftyReader;

impl MetadataReader for LoftyReader {
    fn read(&self, path: &Path, _format: AudioFormat) -> Option<TrackInfo> {
        let tagged_file = match Probe::open(path) {
            Ok(probe) => match probe.read() {
                Ok(file) => file,
                Err(e) => {
                    debug!("failed to read tags from {}: {}", path.display(), e);
                    return None;
                }
            },
            Err(e) => {
                debug!("failed to open {}: {}", path.display(), e);
                return None;
            }
        };

        let mut info = TrackInfo {
            duration: Some(tagged_file.properties().duration().as_secs_f64()),
            ..Default::default()
        };

        // Get tag (primary or first available)
        if let Some(tag) = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
        {
            info.title = tag.title().map(|s| s.to_string()).unwrap_or_default();
            info.artists = collect_values(tag, &ItemKey::TrackArtist);
            info.album_artists = collect_values(tag, &ItemKey::AlbumArtist);
            info.albums = collect_values(tag, &ItemKey::AlbumTitle);
            info.genres = split_genres(collect_values(tag, &ItemKey::Genre));
            info.year = tag.year().map(|y| y as i32);
            info.track_number = tag.track().map(|n| n as i32);
            info.disc_number = format_disc_number(tag.disk(), tag.disk_total());
            info.art_data = front_cover(tag);
        }

        Some(info)
    }
}

fn collect_values(tag: &lofty::tag::Tag, key: &ItemKey) -> Vec<String> {
    tag.get_strings(key)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split each genre value on separator characters, trimming and dropping
/// empties and duplicates.
fn split_genres(values: Vec<String>) -> Vec<String> {
    let mut genres: Vec<String> = Vec::new();
    for value in values {
        for part in value.split(&GENRE_SEPARATORS[..]) {
            let part = part.trim();
            if !part.is_empty() && !genres.iter().any(|g| g == part) {
                genres.push(part.to_string());
            }
        }
    }
    genres
}

fn format_disc_number(disk: Option<u32>, total: Option<u32>) -> Option<String> {
    let disk = disk?;
    match total {
        Some(total) => Some(format!("{disk}/{total}")),
        None => Some(disk.to_string()),
    }
}

/// The front cover picture, or the first picture when no front cover is
/// marked.
fn front_cover(tag: &lofty::tag::Tag) -> Option<Vec<u8>> {
    let pictures = tag.pictures();
    if pictures.is_empty() {
        return None;
    }
    let picture = pictures
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .unwrap_or(&pictures[0]);
    Some(picture.data().to_vec())
}
