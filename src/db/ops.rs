//! Public data-access operations (spec §4.C).
//!
//! Every mutating operation runs inside one `BEGIN DEFERRED … COMMIT` (or
//! `ROLLBACK` on error); a rollback that itself fails is reported as
//! `HardError` (spec §4.C, "Transaction discipline"). Streaming reads use
//! the **borrow** visitor protocol fixed by spec §9's open question: the
//! sink receives a [`MovieRef`] borrowing the connection's [`Builder`],
//! valid only for the duration of that one call.

use rusqlite::TransactionBehavior;

use crate::builder::MovieRef;
use crate::classify::{self, Kind};
use crate::error::DbError;
use crate::model::{Movie, MovieSummary};

use super::connection::Connection;
use super::statements::*;

fn to_db_error(err: rusqlite::Error, context: &str) -> DbError {
    match classify::classify(&err) {
        Kind::UserError => DbError::user(format!("{context}: {err}")),
        Kind::RuntimeError => DbError::Runtime(format!("{context}: {err}")),
        Kind::HardError => DbError::hard(format!("{context}: {err}")),
        Kind::Success => unreachable!("classify() never returns Success for an Err"),
    }
}

/// A rollback failure always classifies as `HardError` regardless of why
/// the transaction was being rolled back (spec §4.C).
fn rollback_failed(err: rusqlite::Error) -> DbError {
    DbError::hard(format!("rollback failed: {err}"))
}

/// Assign `movie.id`, insert `(title, director, release_year)`, insert any
/// new genres, and link each to the new movie — all in one transaction.
pub fn register_movie(conn: &mut Connection, movie: &mut Movie) -> Result<(), DbError> {
    let tx = conn
        .conn
        .transaction_with_behavior(TransactionBehavior::Deferred)
        .map_err(|e| to_db_error(e, "beginning add_movie transaction"))?;

    let result = (|| -> Result<i64, DbError> {
        tx.execute(INSERT_MOVIE, (&movie.title, &movie.director, movie.release_year))
            .map_err(|e| to_db_error(e, "inserting movie"))?;
        let id = tx.last_insert_rowid();
        if id == 0 {
            return Err(DbError::hard("store did not return a generated id"));
        }
        for genre in &movie.genres {
            tx.execute(INSERT_GENRE_IF_ABSENT, [genre.as_str()])
                .map_err(|e| to_db_error(e, "inserting genre"))?;
            let genre_id: i64 = tx
                .query_row(SELECT_GENRE_ID, [genre.as_str()], |row| row.get(0))
                .map_err(|e| to_db_error(e, "looking up genre id"))?;
            tx.execute(LINK_MOVIE_GENRE, (id, genre_id))
                .map_err(|e| to_db_error(e, "linking movie to genre"))?;
        }
        Ok(id)
    })();

    match result {
        Ok(id) => {
            tx.commit().map_err(|e| to_db_error(e, "committing add_movie"))?;
            movie.id = id;
            Ok(())
        }
        Err(e) => {
            tx.rollback().map_err(rollback_failed)?;
            Err(e)
        }
    }
}

/// Create `genre` if absent and link it to `movie_id`.
pub fn add_genre(conn: &mut Connection, movie_id: i64, genre: &str) -> Result<(), DbError> {
    let tx = conn
        .conn
        .transaction_with_behavior(TransactionBehavior::Deferred)
        .map_err(|e| to_db_error(e, "beginning add_genre transaction"))?;

    let result = (|| -> Result<(), DbError> {
        let exists: Option<i64> = tx
            .query_row(SELECT_MOVIE_EXISTS, [movie_id], |row| row.get(0))
            .map_err(|e| to_db_error(e, "checking movie exists"))
            .ok();
        if exists.is_none() {
            return Err(DbError::user(format!(
                "no movie with id = {movie_id} found in the database"
            )));
        }
        tx.execute(INSERT_GENRE_IF_ABSENT, [genre])
            .map_err(|e| to_db_error(e, "inserting genre"))?;
        let genre_id: i64 = tx
            .query_row(SELECT_GENRE_ID, [genre], |row| row.get(0))
            .map_err(|e| to_db_error(e, "looking up genre id"))?;
        tx.execute(LINK_MOVIE_GENRE, (movie_id, genre_id)).map_err(|e| {
            if classify::classify(&e) == Kind::UserError {
                DbError::user(format!("movie {movie_id} is already linked to genre {genre}"))
            } else {
                to_db_error(e, "linking movie to genre")
            }
        })?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            tx.commit().map_err(|e| to_db_error(e, "committing add_genre"))?;
            Ok(())
        }
        Err(e) => {
            tx.rollback().map_err(rollback_failed)?;
            Err(e)
        }
    }
}

/// Remove a movie (cascading to its genre links) and garbage-collect any
/// genre that no movie references any more. The GC is best-effort: a
/// failure there is logged, not propagated (spec §4.C).
pub fn delete_movie(conn: &mut Connection, movie_id: i64) -> Result<(), DbError> {
    let tx = conn
        .conn
        .transaction_with_behavior(TransactionBehavior::Deferred)
        .map_err(|e| to_db_error(e, "beginning remove_movie transaction"))?;

    let result = (|| -> Result<(), DbError> {
        let changed = tx
            .execute(DELETE_MOVIE, [movie_id])
            .map_err(|e| to_db_error(e, "deleting movie"))?;
        if changed == 0 {
            return Err(DbError::user(format!(
                "no movie with id = {movie_id} to be deleted from the database"
            )));
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            if let Err(e) = tx.execute(DELETE_UNUSED_GENRES, []) {
                log::warn!("orphan genre GC failed after deleting movie {movie_id}: {e}");
            }
            tx.commit().map_err(|e| to_db_error(e, "committing remove_movie"))?;
            Ok(())
        }
        Err(e) => {
            tx.rollback().map_err(rollback_failed)?;
            Err(e)
        }
    }
}

/// Single-row read plus a genres subquery; returns an owned [`Movie`] since
/// a one-record result has no reuse pressure on the arena.
pub fn get_movie(conn: &mut Connection, movie_id: i64) -> Result<Movie, DbError> {
    conn.builder.reset();
    let found = conn
        .conn
        .query_row(SELECT_MOVIE_BY_ID, [movie_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i32>(3)?,
            ))
        })
        .map_err(|e| {
            if matches!(e, rusqlite::Error::QueryReturnedNoRows) {
                DbError::user(format!("no movie with id = {movie_id} found in the database"))
            } else {
                to_db_error(e, "reading movie")
            }
        })?;
    let (id, title, director, release_year) = found;
    conn.builder.set_id(id);
    conn.builder.set_title(title.as_bytes());
    conn.builder.set_director(director.as_bytes());
    conn.builder.set_release_year(release_year);
    conn.builder.start_genres();

    let mut stmt = conn
        .conn
        .prepare_cached(SELECT_GENRES_OF_MOVIE)
        .map_err(|e| to_db_error(e, "preparing genre subquery"))?;
    let rows = stmt
        .query_map([movie_id], |row| row.get::<_, String>(0))
        .map_err(|e| to_db_error(e, "reading genres"))?;
    for name in rows {
        let name = name.map_err(|e| to_db_error(e, "reading genre row"))?;
        conn.builder.add_genre(name.as_bytes());
    }
    drop(stmt);

    Ok(conn
        .builder
        .take_current_movie()
        .expect("every field above was set")
        .to_owned_movie())
}

/// Rebuild one [`MovieRef`] per row of `select_all_movies`, invoking `sink`
/// for each and stopping early if it returns `true`.
pub fn list_movies(conn: &mut Connection, sink: impl FnMut(MovieRef<'_>) -> bool) -> Result<(), DbError> {
    stream_movies(conn, SELECT_ALL_MOVIES, None, sink)
}

/// Same as [`list_movies`] but filtered to movies linked to `genre`.
pub fn search_movies_by_genre(
    conn: &mut Connection,
    genre: &str,
    sink: impl FnMut(MovieRef<'_>) -> bool,
) -> Result<(), DbError> {
    stream_movies(conn, SELECT_MOVIES_BY_GENRE, Some(genre), sink)
}

fn stream_movies(
    conn: &mut Connection,
    outer_sql: &str,
    param: Option<&str>,
    mut sink: impl FnMut(MovieRef<'_>) -> bool,
) -> Result<(), DbError> {
    conn.builder.reset();

    let tx = conn
        .conn
        .transaction_with_behavior(TransactionBehavior::Deferred)
        .map_err(|e| to_db_error(e, "beginning read transaction"))?;

    let result = (|| -> Result<(), DbError> {
        let mut outer = tx
            .prepare_cached(outer_sql)
            .map_err(|e| to_db_error(e, "preparing movie query"))?;
        let mut genre_stmt = tx
            .prepare_cached(SELECT_GENRES_OF_MOVIE)
            .map_err(|e| to_db_error(e, "preparing genre subquery"))?;

        let mut rows = match param {
            Some(g) => outer.query([g]),
            None => outer.query([]),
        }
        .map_err(|e| to_db_error(e, "reading movies"))?;

        while let Some(row) = rows.next().map_err(|e| to_db_error(e, "reading movie row"))? {
            let id: i64 = row.get(0).map_err(|e| to_db_error(e, "reading movie id"))?;
            let title: String = row.get(1).map_err(|e| to_db_error(e, "reading movie title"))?;
            let director: String = row
                .get(2)
                .map_err(|e| to_db_error(e, "reading movie director"))?;
            let release_year: i32 = row
                .get(3)
                .map_err(|e| to_db_error(e, "reading movie release_year"))?;

            conn.builder.clear_current();
            conn.builder.set_id(id);
            conn.builder.set_title(title.as_bytes());
            conn.builder.set_director(director.as_bytes());
            conn.builder.set_release_year(release_year);
            conn.builder.start_genres();

            let genre_rows = genre_stmt
                .query_map([id], |r| r.get::<_, String>(0))
                .map_err(|e| to_db_error(e, "reading genres"))?;
            for name in genre_rows {
                let name = name.map_err(|e| to_db_error(e, "reading genre row"))?;
                conn.builder.add_genre(name.as_bytes());
            }

            let movie_ref = conn
                .builder
                .take_current_movie()
                .expect("every field above was set");
            if sink(movie_ref) {
                break;
            }
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            tx.commit().map_err(|e| to_db_error(e, "committing read transaction"))?;
            Ok(())
        }
        Err(e) => {
            tx.rollback().map_err(rollback_failed)?;
            Err(e)
        }
    }
}

/// Rebuild every index (spec §4.C's logical statement set, `reindex`). Not
/// triggered by any client operation; an out-of-band maintenance hook an
/// operator can call (e.g. from a cron job) between traffic windows.
pub fn reindex(conn: &mut Connection) -> Result<(), DbError> {
    conn.conn
        .execute_batch(REINDEX)
        .map_err(|e| to_db_error(e, "reindexing"))
}

/// Stream the cheap `(id, title)` projection to `sink`.
pub fn list_summaries(
    conn: &mut Connection,
    mut sink: impl FnMut(&MovieSummary) -> bool,
) -> Result<(), DbError> {
    conn.builder.reset();

    let tx = conn
        .conn
        .transaction_with_behavior(TransactionBehavior::Deferred)
        .map_err(|e| to_db_error(e, "beginning read transaction"))?;

    let result = (|| -> Result<(), DbError> {
        let mut stmt = tx
            .prepare_cached(SELECT_ALL_TITLES)
            .map_err(|e| to_db_error(e, "preparing summary query"))?;
        let mut rows = stmt.query([]).map_err(|e| to_db_error(e, "reading summaries"))?;

        while let Some(row) = rows.next().map_err(|e| to_db_error(e, "reading summary row"))? {
            let id: i64 = row.get(0).map_err(|e| to_db_error(e, "reading summary id"))?;
            let title: String = row
                .get(1)
                .map_err(|e| to_db_error(e, "reading summary title"))?;

            conn.builder.clear_current();
            conn.builder.set_id(id);
            conn.builder.set_title(title.as_bytes());

            let summary = conn
                .builder
                .take_current_summary()
                .expect("id and title were just set");
            if sink(&summary) {
                break;
            }
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            tx.commit().map_err(|e| to_db_error(e, "committing read transaction"))?;
            Ok(())
        }
        Err(e) => {
            tx.rollback().map_err(rollback_failed)?;
            Err(e)
        }
    }
}
