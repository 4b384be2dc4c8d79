//! Component G — Request Handler (spec §4.G).
//!
//! Drives one client session: Parser (D) → Data-Access Layer (C) → response
//! framing, one operation at a time. Generic over `Read + Write` so tests
//! can exercise it against an in-memory pipe instead of a real socket.

use std::io::{self, Read, Write};

use itertools::Itertools;

use crate::db;
use crate::error::DbError;
use crate::model::{Movie, MovieSummary, Operation};
use crate::parser::OperationParser;

/// Handle one client connection end-to-end, closing the socket before
/// returning. Returns `true` if the session ended on a hard failure the
/// worker should exit on (spec §4.G: "returns that flag to the worker so
/// the worker can exit on `HardError`").
pub fn handle_connection(socket: std::net::TcpStream, conn: &mut db::Connection) -> bool {
    let writer = match socket.try_clone() {
        Ok(w) => w,
        Err(e) => {
            log::warn!("failed to clone socket for response stream: {e}");
            return false;
        }
    };
    let mut writer = io::BufWriter::new(writer);
    let hard_failure = run_session(socket, &mut writer, conn);
    if let Err(e) = writer.flush() {
        log::debug!("final flush failed, client likely disconnected: {e}");
    }
    hard_failure
}

fn run_session<R: Read, W: Write>(reader: R, writer: &mut W, conn: &mut db::Connection) -> bool {
    let mut parser = OperationParser::new(reader);
    loop {
        let op = parser.next_op();
        match op {
            Operation::ParseDone => return false,
            Operation::ParseError { message } => {
                log::debug!("parse error: {message}");
                if write_error_line(writer, &message).is_err() {
                    return false;
                }
            }
            other => {
                let name = other.name();
                if write_ack(writer, &other).is_err() {
                    return false;
                }
                match dispatch(conn, other) {
                    Ok(DispatchOutcome::NoPayload) => {
                        if write_ok(writer).is_err() {
                            return false;
                        }
                    }
                    Ok(DispatchOutcome::Movie(movie)) => {
                        if write_movie_block(writer, &movie).is_err() {
                            return false;
                        }
                    }
                    Ok(DispatchOutcome::MovieList(key, movies)) => {
                        if write_movie_list(writer, key, &movies).is_err() {
                            return false;
                        }
                    }
                    Ok(DispatchOutcome::Summaries(summaries)) => {
                        if write_summary_list(writer, &summaries).is_err() {
                            return false;
                        }
                    }
                    Err(e) => {
                        log::debug!("{name} failed: {e}");
                        if write_error_line(writer, &e.to_errmsg().to_string()).is_err() {
                            return false;
                        }
                        if e.is_hard() {
                            return true;
                        }
                    }
                }
            }
        }
        if writer.flush().is_err() {
            return false;
        }
    }
}

enum DispatchOutcome {
    NoPayload,
    Movie(Movie),
    MovieList(&'static str, Vec<Movie>),
    Summaries(Vec<MovieSummary>),
}

fn dispatch(conn: &mut db::Connection, op: Operation<'_>) -> Result<DispatchOutcome, DbError> {
    match op {
        Operation::AddMovie { mut movie } => {
            log::debug!("add_movie genres: {}", movie.genres.iter().join(", "));
            db::register_movie(conn, &mut movie)?;
            Ok(DispatchOutcome::NoPayload)
        }
        Operation::AddGenre { movie_id, genre } => {
            db::add_genre(conn, movie_id, genre)?;
            Ok(DispatchOutcome::NoPayload)
        }
        Operation::RemoveMovie { movie_id } => {
            db::delete_movie(conn, movie_id)?;
            Ok(DispatchOutcome::NoPayload)
        }
        Operation::GetMovie { movie_id } => {
            let movie = db::get_movie(conn, movie_id)?;
            Ok(DispatchOutcome::Movie(movie))
        }
        Operation::ListMovies => {
            let mut movies = Vec::new();
            db::list_movies(conn, |m| {
                movies.push(m.to_owned_movie());
                false
            })?;
            Ok(DispatchOutcome::MovieList("movies", movies))
        }
        Operation::SearchByGenre { genre } => {
            let mut movies = Vec::new();
            db::search_movies_by_genre(conn, genre, |m| {
                movies.push(m.to_owned_movie());
                false
            })?;
            Ok(DispatchOutcome::MovieList("selected_movies", movies))
        }
        Operation::ListSummaries => {
            let mut summaries = Vec::new();
            db::list_summaries(conn, |s| {
                summaries.push(s.clone());
                false
            })?;
            Ok(DispatchOutcome::Summaries(summaries))
        }
        Operation::ParseError { .. } | Operation::ParseDone => {
            unreachable!("handled before dispatch is called")
        }
    }
}

/// Scalar acknowledgement prefix (spec §4.G, literal wording matched to
/// `spec.md` §8 scenario S1).
fn write_ack<W: Write>(w: &mut W, op: &Operation<'_>) -> io::Result<()> {
    match op {
        Operation::AddMovie { movie } => writeln!(
            w,
            "server: received ADD_MOVIE: {} ({}), by {}",
            movie.title, movie.release_year, movie.director
        ),
        Operation::AddGenre { movie_id, genre } => {
            writeln!(w, "server: received ADD_GENRE: movie {movie_id}, genre {genre}")
        }
        Operation::RemoveMovie { movie_id } => {
            writeln!(w, "server: received REMOVE_MOVIE: {movie_id}")
        }
        Operation::GetMovie { movie_id } => writeln!(w, "server: received GET_MOVIE: {movie_id}"),
        Operation::ListMovies => writeln!(w, "server: received LIST_MOVIES"),
        Operation::SearchByGenre { genre } => {
            writeln!(w, "server: received SEARCH_BY_GENRE: {genre}")
        }
        Operation::ListSummaries => writeln!(w, "server: received LIST_SUMMARIES"),
        Operation::ParseError { .. } | Operation::ParseDone => Ok(()),
    }
}

fn write_ok<W: Write>(w: &mut W) -> io::Result<()> {
    writeln!(w, "server: ok\n")
}

fn write_error_line<W: Write>(w: &mut W, message: &str) -> io::Result<()> {
    writeln!(w, "server: {message}\n")
}

fn write_movie_block<W: Write>(w: &mut W, movie: &Movie) -> io::Result<()> {
    writeln!(w, "movie:")?;
    write_movie_fields(w, movie, "  ")?;
    writeln!(w)
}

fn write_movie_fields<W: Write>(w: &mut W, movie: &Movie, indent: &str) -> io::Result<()> {
    writeln!(w, "{indent}id: {}", movie.id)?;
    writeln!(w, "{indent}title: {}", movie.title)?;
    writeln!(w, "{indent}director: {}", movie.director)?;
    writeln!(w, "{indent}release_year: {}", movie.release_year)?;
    writeln!(w, "{indent}genres:")?;
    for genre in &movie.genres {
        writeln!(w, "{indent}  - {genre}")?;
    }
    Ok(())
}

fn write_movie_list<W: Write>(w: &mut W, key: &str, movies: &[Movie]) -> io::Result<()> {
    writeln!(w, "---")?;
    writeln!(w, "{key}:")?;
    for movie in movies {
        writeln!(w, "  - id: {}", movie.id)?;
        write_movie_fields(w, movie, "    ")?;
    }
    writeln!(w, "...\n")
}

fn write_summary_list<W: Write>(w: &mut W, summaries: &[MovieSummary]) -> io::Result<()> {
    writeln!(w, "---")?;
    writeln!(w, "summaries:")?;
    for s in summaries {
        writeln!(w, "  - id: {}", s.id)?;
        writeln!(w, "    title: {}", s.title)?;
    }
    writeln!(w, "...\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn test_connection() -> db::Connection {
        let path = std::path::Path::new(":memory:");
        db::setup(path).expect("in-memory setup is a no-op on schema only");
        db::connect(path).expect("in-memory connect")
    }

    #[test]
    fn s1_add_movie_then_get_movie() {
        let mut conn = test_connection();
        let input = b"add_movie:\n  title: Inception\n  director: Christopher Nolan\n  release_year: 2010\n  genres:\n    - Action\n    - Sci-Fi\n";
        let mut out = Vec::new();
        let hard = run_session(Cursor::new(input.to_vec()), &mut out, &mut conn);
        assert!(!hard);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("server: received ADD_MOVIE: Inception (2010), by Christopher Nolan"));
        assert!(text.contains("server: ok"));
    }

    #[test]
    fn s3_add_genre_missing_movie_is_a_user_error_not_hard_failure() {
        let mut conn = test_connection();
        let input = b"add_genre:\n  id: 999999\n  genre: Noir\n";
        let mut out = Vec::new();
        let hard = run_session(Cursor::new(input.to_vec()), &mut out, &mut conn);
        assert!(!hard);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("server: no movie with id = 999999 found in the database"));
    }

    #[test]
    fn s4_remove_missing_movie() {
        let mut conn = test_connection();
        let input = b"remove_movie: 42\n";
        let mut out = Vec::new();
        run_session(Cursor::new(input.to_vec()), &mut out, &mut conn);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("server: no movie with id = 42 to be deleted from the database"));
    }

    #[test]
    fn s2_list_summaries_bare_scalar() {
        let mut conn = test_connection();
        let input = b"list_summaries\n";
        let mut out = Vec::new();
        run_session(Cursor::new(input.to_vec()), &mut out, &mut conn);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("---\nsummaries:"));
        assert!(text.contains("...\n"));
    }
}
