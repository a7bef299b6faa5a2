//! Library database operations.
//!
//! Queries and bulk maintenance over the track index. Everything takes a
//! plain connection, so the same functions work inside the scan
//! transaction and on pooled connections.

use rusqlite::{params, Connection, Row};
use std::collections::HashSet;

use super::models::{LibraryStats, Track, TrackRow};
use super::{DbResult, MAX_BOUND_VARIABLES};

/// Map a database row to a Track struct
fn row_to_track(row: &Row) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get("id")?,
        filepath: row.get("filepath")?,
        file_mtime_ns: row.get("file_mtime_ns")?,
        title: row.get("title")?,
        year: row.get("year")?,
        track_number: row.get("track_number")?,
        disc_number: row.get("disc_number")?,
        duration: row.get("duration")?,
        directory_art: row.get("directory_art")?,
        embedded_art: row.get("embedded_art")?,
    })
}

/// Load the change-detection slice of every track, ordered by id.
///
/// A row that fails to load is an error, not a skip: treating a corrupt
/// index as partially empty would make the scan re-add (or delete) half
/// the library.
pub fn get_track_rows(conn: &Connection) -> DbResult<Vec<TrackRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, filepath, file_mtime_ns, directory_art, embedded_art
         FROM tracks ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(TrackRow {
            id: row.get("id")?,
            filepath: row.get("filepath")?,
            file_mtime_ns: row.get("file_mtime_ns")?,
            directory_art: row.get("directory_art")?,
            embedded_art: row.get("embedded_art")?,
        })
    })?;

    let mut tracks = Vec::new();
    for row in rows {
        tracks.push(row?);
    }
    Ok(tracks)
}

/// Delete one batch of tracks together with their relationship rows.
///
/// `ids` must fit within [`MAX_BOUND_VARIABLES`]; callers chunk larger
/// lists. Relationship rows go first, so a later scan reusing one of
/// these ids can never pick up stale links.
pub fn delete_tracks_chunk(conn: &Connection, ids: &[i64]) -> DbResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    debug_assert!(ids.len() <= MAX_BOUND_VARIABLES);

    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let params: Vec<&dyn rusqlite::ToSql> =
        ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();

    for table in ["tracks_artists", "tracks_albums", "tracks_genres"] {
        let sql = format!("DELETE FROM {table} WHERE track_id IN ({placeholders})");
        conn.execute(&sql, params.as_slice())?;
    }

    let sql = format!("DELETE FROM tracks WHERE id IN ({placeholders})");
    let removed = conn.execute(&sql, params.as_slice())?;
    Ok(removed)
}

/// Point every track under `dir_prefix` at `art`.
///
/// `dir_prefix` must be slash-terminated; without the slash, sibling
/// directories sharing a name prefix would be caught too.
pub fn update_directory_art_by_prefix(
    conn: &Connection,
    art: Option<&str>,
    dir_prefix: &str,
) -> DbResult<usize> {
    let updated = conn.execute(
        "UPDATE tracks SET directory_art = ?1 WHERE instr(filepath, ?2) = 1",
        params![art, dir_prefix],
    )?;
    Ok(updated)
}

/// Replace the embedded art path of one track.
pub fn update_embedded_art(conn: &Connection, track_id: i64, art: Option<&str>) -> DbResult<()> {
    conn.execute(
        "UPDATE tracks SET embedded_art = ?1 WHERE id = ?2",
        params![art, track_id],
    )?;
    Ok(())
}

/// Drop artists, albums and genres no track references anymore, then
/// album-artist links left dangling by either side.
pub fn remove_unused_entities(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "DELETE FROM artists WHERE id NOT IN (SELECT artist_id FROM tracks_artists);
         DELETE FROM albums WHERE id NOT IN (SELECT album_id FROM tracks_albums);
         DELETE FROM genres WHERE id NOT IN (SELECT genre_id FROM tracks_genres);
         DELETE FROM albums_artists WHERE album_id NOT IN (SELECT id FROM albums)
             OR artist_id NOT IN (SELECT id FROM artists);",
    )?;
    Ok(())
}

/// Every art path some track still references.
pub fn referenced_art_paths(conn: &Connection) -> DbResult<HashSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT directory_art FROM tracks WHERE directory_art IS NOT NULL
         UNION
         SELECT embedded_art FROM tracks WHERE embedded_art IS NOT NULL",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut paths = HashSet::new();
    for row in rows {
        paths.insert(row?);
    }
    Ok(paths)
}

/// Get all tracks, ordered by filepath
pub fn get_all_tracks(conn: &Connection) -> DbResult<Vec<Track>> {
    let mut stmt = conn.prepare(
        "SELECT id, filepath, file_mtime_ns, title, year, track_number,
                disc_number, duration, directory_art, embedded_art
         FROM tracks ORDER BY filepath",
    )?;
    let tracks: Vec<Track> = stmt
        .query_map([], row_to_track)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(tracks)
}

/// Get a track by filepath
pub fn get_track_by_filepath(conn: &Connection, filepath: &str) -> DbResult<Option<Track>> {
    let mut stmt = conn.prepare(
        "SELECT id, filepath, file_mtime_ns, title, year, track_number,
                disc_number, duration, directory_art, embedded_art
         FROM tracks WHERE filepath = ?",
    )?;

    let result = stmt.query_row([filepath], row_to_track);
    match result {
        Ok(track) => Ok(Some(track)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Artist titles linked to a track, in id order
pub fn get_track_artists(conn: &Connection, track_id: i64) -> DbResult<Vec<String>> {
    titles_for_track(conn, track_id, "artists", "tracks_artists", "artist_id")
}

/// Album titles linked to a track, in id order
pub fn get_track_albums(conn: &Connection, track_id: i64) -> DbResult<Vec<String>> {
    titles_for_track(conn, track_id, "albums", "tracks_albums", "album_id")
}

/// Genre titles linked to a track, in id order
pub fn get_track_genres(conn: &Connection, track_id: i64) -> DbResult<Vec<String>> {
    titles_for_track(conn, track_id, "genres", "tracks_genres", "genre_id")
}

fn titles_for_track(
    conn: &Connection,
    track_id: i64,
    table: &str,
    join_table: &str,
    join_column: &str,
) -> DbResult<Vec<String>> {
    let sql = format!(
        "SELECT {table}.title FROM {table}
         JOIN {join_table} ON {join_table}.{join_column} = {table}.id
         WHERE {join_table}.track_id = ?
         ORDER BY {table}.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let titles: Vec<String> = stmt
        .query_map([track_id], |row| row.get(0))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(titles)
}

/// Get aggregate library statistics
pub fn get_library_stats(conn: &Connection) -> DbResult<LibraryStats> {
    let stats = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM tracks),
                (SELECT COUNT(*) FROM artists),
                (SELECT COUNT(*) FROM albums),
                (SELECT COUNT(*) FROM genres),
                (SELECT COALESCE(SUM(duration), 0.0) FROM tracks)",
        [],
        |row| {
            Ok(LibraryStats {
                tracks: row.get(0)?,
                artists: row.get(1)?,
                albums: row.get(2)?,
                genres: row.get(3)?,
                total_duration: row.get(4)?,
            })
        },
    )?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    fn insert_track(conn: &Connection, id: i64, filepath: &str) {
        conn.execute(
            "INSERT INTO tracks (id, filepath, title) VALUES (?1, ?2, ?3)",
            params![id, filepath, filepath],
        )
        .unwrap();
    }

    #[test]
    fn test_get_track_rows_ordered_by_id() {
        let db = Database::new_in_memory().unwrap();
        let conn = db.conn().unwrap();
        insert_track(&conn, 2, "/b.mp3");
        insert_track(&conn, 1, "/a.mp3");

        let rows = get_track_rows(&conn).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[1].id, 2);
    }

    #[test]
    fn test_delete_tracks_chunk_removes_relationships() {
        let db = Database::new_in_memory().unwrap();
        let conn = db.conn().unwrap();
        insert_track(&conn, 1, "/a.mp3");
        insert_track(&conn, 2, "/b.mp3");
        conn.execute_batch(
            "INSERT INTO artists (id, title) VALUES (1, 'X');
             INSERT INTO tracks_artists VALUES (1, 1);
             INSERT INTO tracks_artists VALUES (2, 1);
             INSERT INTO tracks_genres VALUES (1, 9);",
        )
        .unwrap();

        let removed = delete_tracks_chunk(&conn, &[1]).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM tracks"), 1);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM tracks_artists"), 1);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM tracks_genres"), 0);
    }

    #[test]
    fn test_delete_large_id_list_in_chunks() {
        let db = Database::new_in_memory().unwrap();
        let conn = db.conn().unwrap();
        let ids: Vec<i64> = (1..=1500).collect();
        for &id in &ids {
            insert_track(&conn, id, &format!("/music/{id}.mp3"));
        }

        let mut removed = 0;
        for chunk in ids.chunks(MAX_BOUND_VARIABLES) {
            removed += delete_tracks_chunk(&conn, chunk).unwrap();
        }
        assert_eq!(removed, 1500);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM tracks"), 0);
    }

    #[test]
    fn test_update_directory_art_needs_terminated_prefix() {
        let db = Database::new_in_memory().unwrap();
        let conn = db.conn().unwrap();
        insert_track(&conn, 1, "/music/a/1.mp3");
        insert_track(&conn, 2, "/music/a/2.mp3");
        insert_track(&conn, 3, "/music/ab/3.mp3");

        let updated =
            update_directory_art_by_prefix(&conn, Some("/music/a/cover.jpg"), "/music/a/").unwrap();
        assert_eq!(updated, 2);

        // the sibling directory with a shared name prefix is untouched
        let art: Option<String> = conn
            .query_row(
                "SELECT directory_art FROM tracks WHERE id = 3",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(art, None);
    }

    #[test]
    fn test_remove_unused_entities() {
        let db = Database::new_in_memory().unwrap();
        let conn = db.conn().unwrap();
        insert_track(&conn, 1, "/a.mp3");
        conn.execute_batch(
            "INSERT INTO artists (id, title) VALUES (1, 'Kept');
             INSERT INTO artists (id, title) VALUES (2, 'Orphan');
             INSERT INTO albums (id, title) VALUES (1, 'Orphan Album');
             INSERT INTO genres (id, title) VALUES (1, 'Orphan Genre');
             INSERT INTO tracks_artists VALUES (1, 1);
             INSERT INTO albums_artists VALUES (1, 2);",
        )
        .unwrap();

        remove_unused_entities(&conn).unwrap();

        assert_eq!(count(&conn, "SELECT COUNT(*) FROM artists"), 1);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM albums"), 0);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM genres"), 0);
        // the link pointed at a removed album and a removed artist
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM albums_artists"), 0);
    }

    #[test]
    fn test_referenced_art_paths_union() {
        let db = Database::new_in_memory().unwrap();
        let conn = db.conn().unwrap();
        conn.execute_batch(
            "INSERT INTO tracks (id, filepath, title, directory_art, embedded_art)
             VALUES (1, '/a.mp3', 'a', '/art/cover.jpg', '/cache/x-embedded.jpg');
             INSERT INTO tracks (id, filepath, title, directory_art)
             VALUES (2, '/b.mp3', 'b', '/art/cover.jpg');
             INSERT INTO tracks (id, filepath, title) VALUES (3, '/c.mp3', 'c');",
        )
        .unwrap();

        let paths = referenced_art_paths(&conn).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths.contains("/art/cover.jpg"));
        assert!(paths.contains("/cache/x-embedded.jpg"));
    }

    #[test]
    fn test_get_track_by_filepath() {
        let db = Database::new_in_memory().unwrap();
        let conn = db.conn().unwrap();
        insert_track(&conn, 1, "/music/a.mp3");

        let found = get_track_by_filepath(&conn, "/music/a.mp3").unwrap();
        assert_eq!(found.unwrap().id, 1);

        let missing = get_track_by_filepath(&conn, "/music/b.mp3").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_track_title_lists() {
        let db = Database::new_in_memory().unwrap();
        let conn = db.conn().unwrap();
        insert_track(&conn, 1, "/a.mp3");
        conn.execute_batch(
            "INSERT INTO artists (id, title) VALUES (1, 'X');
             INSERT INTO artists (id, title) VALUES (2, 'Y');
             INSERT INTO genres (id, title) VALUES (1, 'Rock');
             INSERT INTO tracks_artists VALUES (1, 2);
             INSERT INTO tracks_artists VALUES (1, 1);
             INSERT INTO tracks_genres VALUES (1, 1);",
        )
        .unwrap();

        assert_eq!(
            get_track_artists(&conn, 1).unwrap(),
            vec!["X".to_string(), "Y".to_string()]
        );
        assert_eq!(get_track_genres(&conn, 1).unwrap(), vec!["Rock".to_string()]);
        assert!(get_track_albums(&conn, 1).unwrap().is_empty());
    }

    #[test]
    fn test_library_stats() {
        let db = Database::new_in_memory().unwrap();
        let conn = db.conn().unwrap();

        let empty = get_library_stats(&conn).unwrap();
        assert_eq!(empty.tracks, 0);
        assert_eq!(empty.total_duration, 0.0);

        conn.execute_batch(
            "INSERT INTO tracks (id, filepath, title, duration) VALUES (1, '/a.mp3', 'a', 120.5);
             INSERT INTO tracks (id, filepath, title, duration) VALUES (2, '/b.mp3', 'b', 60.0);
             INSERT INTO tracks (id, filepath, title) VALUES (3, '/c.mp3', 'c');
             INSERT INTO artists (id, title) VALUES (1, 'X');",
        )
        .unwrap();

        let stats = get_library_stats(&conn).unwrap();
        assert_eq!(stats.tracks, 3);
        assert_eq!(stats.artists, 1);
        assert_eq!(stats.total_duration, 180.5);
    }
}
