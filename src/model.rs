//! The entities the wire protocol and the store agree on (spec §3).

use std::net::TcpStream;

/// A movie record. `id == 0` means "not yet assigned" — only valid for a
/// record about to be passed to [`crate::db::register_movie`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub director: String,
    pub release_year: i32,
    /// Insertion order is preserved; duplicates are rejected at the
    /// data-access layer, not here.
    pub genres: Vec<String>,
}

/// Cheap projection of a [`Movie`] used by the summary listing path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieSummary {
    pub id: i64,
    pub title: String,
}

/// One parsed client request (spec §3, "Operation").
///
/// String fields borrow from the [`crate::builder::Builder`] that produced
/// them; they are valid until the parser's next `next_op` call. Callers that
/// need them past that window must copy them out first (spec §9, "String
/// ownership in operations").
#[derive(Debug)]
pub enum Operation<'a> {
    AddMovie { movie: Movie },
    AddGenre { movie_id: i64, genre: &'a str },
    RemoveMovie { movie_id: i64 },
    GetMovie { movie_id: i64 },
    ListMovies,
    SearchByGenre { genre: &'a str },
    ListSummaries,
    /// Terminal for this one operation, not for the stream.
    ParseError { message: String },
    /// Terminal for the stream: no further operations will be produced.
    ParseDone,
}

impl<'a> Operation<'a> {
    /// A short, stable name used in the acknowledgement line (spec §4.G).
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AddMovie { .. } => "ADD_MOVIE",
            Operation::AddGenre { .. } => "ADD_GENRE",
            Operation::RemoveMovie { .. } => "REMOVE_MOVIE",
            Operation::GetMovie { .. } => "GET_MOVIE",
            Operation::ListMovies => "LIST_MOVIES",
            Operation::SearchByGenre { .. } => "SEARCH_BY_GENRE",
            Operation::ListSummaries => "LIST_SUMMARIES",
            Operation::ParseError { .. } => "PARSE_ERROR",
            Operation::ParseDone => "PARSE_DONE",
        }
    }
}

/// An owned, ready-to-serve client socket, handed from the accept loop to a
/// worker through the [`crate::queue::WorkQueue`].
pub type WorkItem = TcpStream;

/// The seven operation names and their single-character numeric aliases
/// (spec §6, "Wire format (request)").
pub const OPERATION_ALIASES: &[(&str, &str, u8)] = &[
    ("add_movie", "1", 1),
    ("add_genre", "2", 2),
    ("remove_movie", "3", 3),
    ("get_movie", "4", 4),
    ("list_movies", "5", 5),
    ("search_by_genre", "6", 6),
    ("list_summaries", "7", 7),
];

/// Resolve an operation key, either by its symbolic name or its numeric
/// alias (`"1".."7"`), to the canonical symbolic name.
pub fn resolve_operation_key(key: &str) -> Option<&'static str> {
    OPERATION_ALIASES
        .iter()
        .find(|(name, code, _)| *name == key || *code == key)
        .map(|(name, _, _)| *name)
}

