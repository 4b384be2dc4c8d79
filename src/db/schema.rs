//! Schema creation (spec §6, "Persisted state"; SPEC_FULL §3).
//!
//! Logical entities from spec §3 turned into concrete tables: movies,
//! genres, and the many-to-many link, with the unique indexes and cascading
//! foreign keys the base spec names without spelling out DDL for.

pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS movies (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    title         TEXT NOT NULL,
    director      TEXT NOT NULL,
    release_year  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS genres (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name  TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_genres_name ON genres (name);

CREATE TABLE IF NOT EXISTS movie_genres (
    movie_id  INTEGER NOT NULL REFERENCES movies (id) ON DELETE CASCADE,
    genre_id  INTEGER NOT NULL REFERENCES genres (id) ON DELETE CASCADE
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_movie_genres_pair
    ON movie_genres (movie_id, genre_id);
";

/// Apply the schema to a freshly opened connection. Idempotent (every
/// statement is `IF NOT EXISTS`), so `setup` and `connect` can both call it
/// safely.
pub fn apply(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CREATE_TABLES)
}
