//! Component C — Data-Access Layer (spec §4.C).
//!
//! A small synchronous API over the store that hides SQL and statement
//! lifecycles. One [`Connection`] is used by exactly one thread at a time
//! (spec §3).

mod connection;
mod ops;
mod schema;
mod statements;

pub use connection::{connect, disconnect, setup, Connection};
pub use ops::{
    add_genre, delete_movie, get_movie, list_movies, list_summaries, register_movie, reindex,
    search_movies_by_genre,
};
