//! The logical prepared-statement set from spec §4.C, as SQL text.
//!
//! Rather than hand-maintain a cache of `rusqlite::Statement<'conn>` (a
//! self-referential type next to the `Connection` it borrows from), every
//! operation calls [`rusqlite::Connection::prepare_cached`], which keeps its
//! own small LRU of compiled statements keyed by SQL text. [`configure_cache`]
//! sizes that cache to the statement count below so every one of them stays
//! resident for the life of the connection, matching spec §4.C's "the cache
//! is built once on connect" without the lifetime bookkeeping.

pub const INSERT_MOVIE: &str =
    "INSERT INTO movies (title, director, release_year) VALUES (?1, ?2, ?3)";

pub const INSERT_GENRE_IF_ABSENT: &str = "INSERT OR IGNORE INTO genres (name) VALUES (?1)";

pub const SELECT_GENRE_ID: &str = "SELECT id FROM genres WHERE name = ?1";

pub const LINK_MOVIE_GENRE: &str =
    "INSERT INTO movie_genres (movie_id, genre_id) VALUES (?1, ?2)";

pub const SELECT_MOVIE_EXISTS: &str = "SELECT 1 FROM movies WHERE id = ?1";

pub const DELETE_MOVIE: &str = "DELETE FROM movies WHERE id = ?1";

pub const DELETE_UNUSED_GENRES: &str =
    "DELETE FROM genres WHERE id NOT IN (SELECT DISTINCT genre_id FROM movie_genres)";

pub const SELECT_ALL_TITLES: &str = "SELECT id, title FROM movies ORDER BY id";

pub const SELECT_ALL_MOVIES: &str =
    "SELECT id, title, director, release_year FROM movies ORDER BY id";

pub const SELECT_MOVIE_BY_ID: &str =
    "SELECT id, title, director, release_year FROM movies WHERE id = ?1";

pub const SELECT_MOVIES_BY_GENRE: &str = "
SELECT m.id, m.title, m.director, m.release_year
FROM movies m
JOIN movie_genres mg ON mg.movie_id = m.id
JOIN genres g ON g.id = mg.genre_id
WHERE g.name = ?1
ORDER BY m.id";

pub const SELECT_GENRES_OF_MOVIE: &str = "
SELECT g.name
FROM genres g
JOIN movie_genres mg ON mg.genre_id = g.id
WHERE mg.movie_id = ?1
ORDER BY g.id";

/// Rebuild every index (spec §4.C's logical statement set lists `reindex`
/// alongside `begin`/`commit`/`rollback`). Not reachable from any of the
/// seven wire operations; exposed as a maintenance operation an operator
/// can invoke out of band (see [`super::ops::reindex`]).
pub const REINDEX: &str = "REINDEX";

/// Number of distinct logical statements above; the cache is sized to hold
/// all of them at once so none gets evicted under normal traffic.
const STATEMENT_COUNT: usize = 13;

pub fn configure_cache(conn: &rusqlite::Connection) {
    conn.set_prepared_statement_cache_capacity(STATEMENT_COUNT);
}
