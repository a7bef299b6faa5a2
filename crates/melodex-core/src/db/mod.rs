//! SQLite access layer.
//!
//! Connection pooling over a single database file. Opening a [`Database`]
//! applies the pragmas and creates the schema, so a fresh path is ready
//! for scanning immediately.

pub mod entities;
pub mod library;
pub mod models;
pub mod schema;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub use models::*;

/// Upper bound on variables bound to one statement, below SQLite's
/// compile-time default. Bulk operations chunk their id lists to stay
/// under it.
pub const MAX_BOUND_VARIABLES: usize = 999;

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection pool type alias
pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Main database interface with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: Arc<DbPool>,
}

impl Database {
    /// Open the database at `db_path`, creating the file, its parent
    /// directory and the schema as needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> DbResult<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(10)
            .min_idle(Some(2))
            .build(manager)?;

        let db = Self {
            pool: Arc::new(pool),
        };

        db.init()?;

        Ok(db)
    }

    /// Create an in-memory database (useful for testing)
    pub fn new_in_memory() -> DbResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;

        let db = Self {
            pool: Arc::new(pool),
        };

        db.init()?;

        Ok(db)
    }

    fn init(&self) -> DbResult<()> {
        let conn = self.pool.get()?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA cache_size = -64000;
            ",
        )?;

        schema::create_tables(&conn)?;

        Ok(())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> DbResult<DbConnection> {
        Ok(self.pool.get()?)
    }
}
