//! Schema definition for the library database.
//!
//! Track ids are plain `INTEGER PRIMARY KEY` without AUTOINCREMENT; the
//! scanner assigns ids itself from the current maximum, so deleted ids
//! may be reused by a later scan. Relationship tables carry no foreign
//! key clauses, the scanner keeps them consistent and prunes orphans at
//! the end of every run.

use super::DbResult;
use rusqlite::Connection;

/// Table definitions as (name, CREATE statement) pairs.
pub const CREATE_TABLES: &[(&str, &str)] = &[
    (
        "tracks",
        "CREATE TABLE IF NOT EXISTS tracks (
            id INTEGER PRIMARY KEY,
            filepath TEXT NOT NULL UNIQUE,
            file_mtime_ns INTEGER,
            title TEXT NOT NULL,
            year INTEGER,
            track_number INTEGER,
            disc_number TEXT,
            duration REAL,
            directory_art TEXT,
            embedded_art TEXT
        )",
    ),
    (
        "artists",
        "CREATE TABLE IF NOT EXISTS artists (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL UNIQUE
        )",
    ),
    (
        "albums",
        "CREATE TABLE IF NOT EXISTS albums (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL
        )",
    ),
    (
        "genres",
        "CREATE TABLE IF NOT EXISTS genres (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL UNIQUE
        )",
    ),
    (
        "tracks_artists",
        "CREATE TABLE IF NOT EXISTS tracks_artists (
            track_id INTEGER NOT NULL,
            artist_id INTEGER NOT NULL
        )",
    ),
    (
        "tracks_albums",
        "CREATE TABLE IF NOT EXISTS tracks_albums (
            track_id INTEGER NOT NULL,
            album_id INTEGER NOT NULL
        )",
    ),
    (
        "tracks_genres",
        "CREATE TABLE IF NOT EXISTS tracks_genres (
            track_id INTEGER NOT NULL,
            genre_id INTEGER NOT NULL
        )",
    ),
    (
        "albums_artists",
        "CREATE TABLE IF NOT EXISTS albums_artists (
            album_id INTEGER NOT NULL,
            artist_id INTEGER NOT NULL
        )",
    ),
];

/// Indexes on the relationship tables, one per column.
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_tracks_artists_track ON tracks_artists (track_id)",
    "CREATE INDEX IF NOT EXISTS idx_tracks_artists_artist ON tracks_artists (artist_id)",
    "CREATE INDEX IF NOT EXISTS idx_tracks_albums_track ON tracks_albums (track_id)",
    "CREATE INDEX IF NOT EXISTS idx_tracks_albums_album ON tracks_albums (album_id)",
    "CREATE INDEX IF NOT EXISTS idx_tracks_genres_track ON tracks_genres (track_id)",
    "CREATE INDEX IF NOT EXISTS idx_tracks_genres_genre ON tracks_genres (genre_id)",
    "CREATE INDEX IF NOT EXISTS idx_albums_artists_album ON albums_artists (album_id)",
    "CREATE INDEX IF NOT EXISTS idx_albums_artists_artist ON albums_artists (artist_id)",
];

/// Create all tables and indexes if they don't exist
pub fn create_tables(conn: &Connection) -> DbResult<()> {
    for (_name, sql) in CREATE_TABLES {
        conn.execute(sql, [])?;
    }
    for sql in CREATE_INDEXES {
        conn.execute(sql, [])?;
    }
    Ok(())
}
