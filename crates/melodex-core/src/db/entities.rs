//! Entity deduplication for track insertion.
//!
//! Artists, albums and genres are shared between tracks. A [`TrackAdder`]
//! seeds title-to-id maps once per scan and resolves every track against
//! them, so each entity row is created at most once. New ids come from
//! in-memory counters seeded with the current table maxima and bound
//! explicitly on insert; within a run the counters are the only
//! authority for id assignment.
//!
//! Albums are identified by title plus the set of album artist ids, so
//! two albums with the same name by different artists stay separate
//! while tracks of one album collapse onto one row.

use std::collections::HashMap;

use rusqlite::{params, Connection};
use tracing::warn;

use super::models::NewTrack;
use super::DbResult;

/// Key identifying one album.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlbumKey {
    title: String,
    artist_ids: Vec<i64>,
}

impl AlbumKey {
    /// Artist ids are sorted and deduplicated so equality does not
    /// depend on tag order.
    pub fn new(title: &str, mut artist_ids: Vec<i64>) -> AlbumKey {
        artist_ids.sort_unstable();
        artist_ids.dedup();
        AlbumKey {
            title: title.to_string(),
            artist_ids,
        }
    }
}

/// Title-to-id map for one entity table, plus the id counter for new
/// rows.
struct EntityIds {
    table: &'static str,
    by_title: HashMap<String, i64>,
    last_id: i64,
}

impl EntityIds {
    fn load(conn: &Connection, table: &'static str) -> DbResult<EntityIds> {
        let mut stmt = conn.prepare(&format!("SELECT id, title FROM {table}"))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut by_title = HashMap::new();
        let mut last_id = 0;
        for row in rows {
            let (id, title) = row?;
            last_id = last_id.max(id);
            by_title.insert(title, id);
        }

        Ok(EntityIds {
            table,
            by_title,
            last_id,
        })
    }

    /// Resolve `title` to an id, inserting a new row when unseen.
    ///
    /// Resolves to 0 for empty titles and failed inserts; no row ever
    /// has id 0, and callers skip relationship rows for it.
    fn resolve_or_create(&mut self, conn: &Connection, title: &str) -> i64 {
        if title.is_empty() {
            return 0;
        }
        if let Some(&id) = self.by_title.get(title) {
            return id;
        }

        let id = self.last_id + 1;
        match conn.execute(
            &format!("INSERT INTO {} (id, title) VALUES (?1, ?2)", self.table),
            params![id, title],
        ) {
            Ok(_) => {
                self.last_id = id;
                self.by_title.insert(title.to_string(), id);
                id
            }
            Err(e) => {
                warn!("failed to insert into {}: {}", self.table, e);
                0
            }
        }
    }
}

/// Album map keyed by [`AlbumKey`].
struct AlbumIds {
    by_key: HashMap<AlbumKey, i64>,
    last_id: i64,
}

impl AlbumIds {
    fn load(conn: &Connection) -> DbResult<AlbumIds> {
        let mut stmt = conn.prepare(
            "SELECT albums.id, albums.title, albums_artists.artist_id
             FROM albums
             LEFT JOIN albums_artists ON albums_artists.album_id = albums.id
             ORDER BY albums.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?,
            ))
        })?;

        // The join yields one row per album artist; collapse consecutive
        // rows with the same album id into one key.
        let mut by_key = HashMap::new();
        let mut last_id = 0;
        let mut current: Option<(i64, String, Vec<i64>)> = None;
        for row in rows {
            let (id, title, artist_id) = row?;
            last_id = last_id.max(id);
            match current.as_mut() {
                Some((current_id, _, artist_ids)) if *current_id == id => {
                    if let Some(artist_id) = artist_id {
                        artist_ids.push(artist_id);
                    }
                }
                _ => {
                    if let Some((done_id, done_title, artist_ids)) = current.take() {
                        by_key.insert(AlbumKey::new(&done_title, artist_ids), done_id);
                    }
                    current = Some((id, title, artist_id.into_iter().collect()));
                }
            }
        }
        if let Some((id, title, artist_ids)) = current {
            by_key.insert(AlbumKey::new(&title, artist_ids), id);
        }

        Ok(AlbumIds { by_key, last_id })
    }

    fn resolve_or_create(&mut self, conn: &Connection, title: &str, artist_ids: &[i64]) -> i64 {
        if title.is_empty() {
            return 0;
        }
        let key = AlbumKey::new(title, artist_ids.to_vec());
        if let Some(&id) = self.by_key.get(&key) {
            return id;
        }

        let id = self.last_id + 1;
        if let Err(e) = conn.execute(
            "INSERT INTO albums (id, title) VALUES (?1, ?2)",
            params![id, title],
        ) {
            warn!("failed to insert album: {e}");
            return 0;
        }
        self.last_id = id;
        for &artist_id in &key.artist_ids {
            insert_relationship(conn, "albums_artists", id, artist_id);
        }
        self.by_key.insert(key, id);
        id
    }
}

/// Relationship rows are advisory: a failed insert is logged and the
/// scan continues without the link.
fn insert_relationship(conn: &Connection, table: &str, first: i64, second: i64) {
    if let Err(e) = conn.execute(
        &format!("INSERT INTO {table} VALUES (?1, ?2)"),
        params![first, second],
    ) {
        warn!("failed to insert {table} relationship: {e}");
    }
}

/// Inserts tracks and their entity links against one connection.
///
/// Construction seeds all dedup maps; a seeding failure aborts the scan,
/// since adding tracks over a partially loaded map would duplicate
/// entities.
pub struct TrackAdder<'c> {
    conn: &'c Connection,
    last_track_id: i64,
    artists: EntityIds,
    genres: EntityIds,
    albums: AlbumIds,
}

impl<'c> TrackAdder<'c> {
    pub fn new(conn: &'c Connection) -> DbResult<TrackAdder<'c>> {
        let last_track_id =
            conn.query_row("SELECT COALESCE(MAX(id), 0) FROM tracks", [], |row| {
                row.get(0)
            })?;
        Ok(TrackAdder {
            conn,
            last_track_id,
            artists: EntityIds::load(conn, "artists")?,
            genres: EntityIds::load(conn, "genres")?,
            albums: AlbumIds::load(conn)?,
        })
    }

    /// Insert one track and its relationships.
    ///
    /// A failed track insert is logged and skipped; the id counter only
    /// advances on success. Relationship failures never abort the track.
    pub fn add_track(&mut self, track: NewTrack) {
        let id = self.last_track_id + 1;
        if let Err(e) = self.conn.execute(
            "INSERT INTO tracks (id, filepath, file_mtime_ns, title, year, track_number,
                                 disc_number, duration, directory_art, embedded_art)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                track.filepath,
                track.file_mtime_ns,
                track.title,
                track.year,
                track.track_number,
                track.disc_number,
                track.duration,
                track.directory_art,
                track.embedded_art,
            ],
        ) {
            warn!("failed to insert track {}: {}", track.filepath, e);
            return;
        }
        self.last_track_id = id;

        // Album artists are artists of the track too
        let mut artists = track.artists;
        for album_artist in &track.album_artists {
            if !artists.contains(album_artist) {
                artists.push(album_artist.clone());
            }
        }

        let mut artist_ids: Vec<i64> = Vec::with_capacity(artists.len());
        for artist in &artists {
            let artist_id = self.artists.resolve_or_create(self.conn, artist);
            if artist_id != 0 && !artist_ids.contains(&artist_id) {
                artist_ids.push(artist_id);
                insert_relationship(self.conn, "tracks_artists", id, artist_id);
            }
        }

        // Album identity follows the album artists; a track artist
        // stands in when none are tagged
        let mut album_artist_ids: Vec<i64> = Vec::with_capacity(track.album_artists.len());
        for album_artist in &track.album_artists {
            let artist_id = self.artists.resolve_or_create(self.conn, album_artist);
            if artist_id != 0 {
                album_artist_ids.push(artist_id);
            }
        }
        if album_artist_ids.is_empty() {
            if let Some(&first) = artist_ids.first() {
                album_artist_ids.push(first);
            }
        }

        let mut album_ids: Vec<i64> = Vec::with_capacity(track.albums.len());
        for album in &track.albums {
            let album_id = self
                .albums
                .resolve_or_create(self.conn, album, &album_artist_ids);
            if album_id != 0 && !album_ids.contains(&album_id) {
                album_ids.push(album_id);
                insert_relationship(self.conn, "tracks_albums", id, album_id);
            }
        }

        let mut genre_ids: Vec<i64> = Vec::with_capacity(track.genres.len());
        for genre in &track.genres {
            let genre_id = self.genres.resolve_or_create(self.conn, genre);
            if genre_id != 0 && !genre_ids.contains(&genre_id) {
                genre_ids.push(genre_id);
                insert_relationship(self.conn, "tracks_genres", id, genre_id);
            }
        }
    }
}
