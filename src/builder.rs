//! Component B — Record Arena/Builder.
//!
//! Amortizes per-record allocation while assembling one [`Movie`] or
//! [`MovieSummary`] at a time, and optionally a list of them, by writing
//! variable-length fields (title, director, genre names) into a reusable
//! byte arena addressed by integer offsets rather than allocating a `String`
//! per field (spec §4.B).
//!
//! The teacher crate reaches for `typed_arena::Arena` for its own permanent,
//! never-reset allocations; that type has no reset, which this component's
//! per-record reuse needs, so the arena here is a hand-rolled `Vec<u8>` page
//! store instead (see DESIGN.md).

use crate::model::{Movie, MovieSummary};

/// Bytes per arena page growth step (spec §4.B).
const PAGE_SIZE: usize = 4096;

/// Byte offset into the arena, paired with a length, addressing a
/// NUL-terminated UTF-8 slice written by [`Builder::push_str`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct StrSpan {
    offset: usize,
    len: usize,
}

/// Which scalar fields have been set on the record currently under
/// construction (spec §4.B, "five has-been-set flags").
#[derive(Debug, Default, Clone, Copy)]
struct HasFlags {
    id: bool,
    title: bool,
    director: bool,
    release_year: bool,
    genres: bool,
}

impl HasFlags {
    fn clear(&mut self) {
        *self = HasFlags::default();
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct CurrentRecord {
    id: i64,
    release_year: i32,
    title: StrSpan,
    director: StrSpan,
    /// Start offset of this record's genre region; genre count follows.
    genre_start: usize,
    genre_count: usize,
    has: HasFlags,
}

/// A completed record's position within the arena and list, tagged by shape.
#[derive(Debug, Clone, Copy)]
enum Descriptor {
    Movie {
        id: i64,
        release_year: i32,
        title: StrSpan,
        director: StrSpan,
        genre_start: usize,
        genre_count: usize,
    },
    Summary {
        id: i64,
        title: StrSpan,
    },
}

impl Default for Descriptor {
    fn default() -> Self {
        Descriptor::Summary {
            id: 0,
            title: StrSpan::default(),
        }
    }
}

/// A borrowed view of a movie's fields into the arena, valid until the next
/// mutation of the [`Builder`] that produced it (spec §3, "Ownership &
/// lifecycle").
#[derive(Debug, Clone, Copy)]
pub struct MovieRef<'a> {
    pub id: i64,
    pub title: &'a str,
    pub director: &'a str,
    pub release_year: i32,
    arena: &'a Builder,
    genre_start: usize,
    genre_count: usize,
}

impl<'a> MovieRef<'a> {
    /// Iterate this record's genres in insertion order.
    pub fn genres(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.arena.iter_genres(self.genre_start, self.genre_count)
    }

    pub fn to_owned_movie(&self) -> Movie {
        Movie {
            id: self.id,
            title: self.title.to_owned(),
            director: self.director.to_owned(),
            release_year: self.release_year,
            genres: self.genres().map(str::to_owned).collect(),
        }
    }
}

/// The reusable per-connection record assembler (spec §4.B).
///
/// Every mutation that may grow the arena returns `bool`: `true` on success,
/// `false` if growth failed (arithmetic overflow or allocator failure),
/// leaving the builder's visible state unchanged.
#[derive(Debug, Default)]
pub struct Builder {
    str_data: Vec<u8>,
    current: CurrentRecord,
    /// Completed-record descriptors. Most responses list a handful of
    /// records, so a small inline capacity avoids a heap allocation for the
    /// common case and only spills once a result set grows past it.
    list: tinyvec::TinyVec<[Descriptor; 8]>,
    /// A single extra string slot outside any record, for the parser's
    /// single-string operations (`AddGenre`, `SearchByGenre`): a bare genre
    /// name has nowhere else to live once the YAML event that carried it is
    /// gone. Reuses the same arena and reset discipline as everything else.
    scratch: Option<StrSpan>,
}

impl Builder {
    pub fn new() -> Self {
        Builder::default()
    }

    /// Zero the watermarks and has-flags for a fresh record. Previously
    /// taken borrows are invalidated (spec §4.B).
    pub fn reset(&mut self) {
        self.str_data.clear();
        self.current = CurrentRecord::default();
        self.list.clear();
        self.scratch = None;
    }

    /// Copy `bytes` into the arena as the scratch string, replacing any
    /// previous one. Used by the parser for a bare id/genre scalar that
    /// belongs to no record.
    pub(crate) fn set_scratch(&mut self, bytes: &[u8]) -> bool {
        match self.push_str(bytes) {
            Some(span) => {
                self.scratch = Some(span);
                true
            }
            None => false,
        }
    }

    /// The most recently set scratch string. Panics if none was set; callers
    /// only read this right after a successful `set_scratch`.
    pub(crate) fn scratch(&self) -> &str {
        let span = self.scratch.expect("scratch read before set_scratch");
        self.slice(span)
    }

    fn grow_for(&mut self, additional: usize) -> bool {
        let needed = match self.str_data.len().checked_add(additional) {
            Some(n) => n,
            None => return false,
        };
        if needed <= self.str_data.capacity() {
            return true;
        }
        let pages = needed.div_ceil(PAGE_SIZE);
        let target = match pages.checked_mul(PAGE_SIZE) {
            Some(t) => t,
            None => return false,
        };
        let extra = target.saturating_sub(self.str_data.capacity());
        self.str_data.try_reserve(extra).is_ok()
    }

    /// Write a NUL-terminated copy of `bytes` into the arena, returning its
    /// span, or `false` on allocation failure.
    fn push_str(&mut self, bytes: &[u8]) -> Option<StrSpan> {
        if !self.grow_for(bytes.len() + 1) {
            return None;
        }
        let offset = self.str_data.len();
        self.str_data.extend_from_slice(bytes);
        self.str_data.push(0);
        Some(StrSpan {
            offset,
            len: bytes.len(),
        })
    }

    fn slice(&self, span: StrSpan) -> &str {
        let bytes = &self.str_data[span.offset..span.offset + span.len];
        std::str::from_utf8(bytes).expect("arena slices are always valid UTF-8 on insertion")
    }

    pub fn has_id(&self) -> bool {
        self.current.has.id
    }
    pub fn has_title(&self) -> bool {
        self.current.has.title
    }
    pub fn has_director(&self) -> bool {
        self.current.has.director
    }
    pub fn has_release_year(&self) -> bool {
        self.current.has.release_year
    }
    pub fn has_genres(&self) -> bool {
        self.current.has.genres
    }

    /// Set the `id` field. At most once per record; later calls are ignored
    /// (callers are expected to have already checked `has_id`).
    pub fn set_id(&mut self, id: i64) -> bool {
        self.current.id = id;
        self.current.has.id = true;
        true
    }

    pub fn set_release_year(&mut self, year: i32) -> bool {
        self.current.release_year = year;
        self.current.has.release_year = true;
        true
    }

    pub fn set_title(&mut self, bytes: &[u8]) -> bool {
        match self.push_str(bytes) {
            Some(span) => {
                self.current.title = span;
                self.current.has.title = true;
                true
            }
            None => false,
        }
    }

    pub fn set_director(&mut self, bytes: &[u8]) -> bool {
        match self.push_str(bytes) {
            Some(span) => {
                self.current.director = span;
                self.current.has.director = true;
                true
            }
            None => false,
        }
    }

    /// Clear the current record's has-flags only, leaving the arena and any
    /// already-accumulated list untouched. Streaming reads that rebuild one
    /// record per row without materializing a list call this between rows
    /// instead of `reset` (spec §4.C: "the builder is reset once at the
    /// start; each outer row reuses the builder").
    pub(crate) fn clear_current(&mut self) {
        self.current.has.clear();
    }

    /// Mark the current arena watermark as the start of this record's genre
    /// region. Idempotent: calling it again before any `add_genre` is a
    /// no-op other than re-marking the (unchanged) start.
    pub fn start_genres(&mut self) -> bool {
        if !self.current.has.genres {
            self.current.genre_start = self.str_data.len();
            self.current.genre_count = 0;
            self.current.has.genres = true;
        }
        true
    }

    /// Append one NUL-terminated genre name to the current record's genre
    /// region. `start_genres` must have been called first.
    pub fn add_genre(&mut self, bytes: &[u8]) -> bool {
        debug_assert!(self.current.has.genres, "start_genres must precede add_genre");
        match self.push_str(bytes) {
            Some(_) => {
                self.current.genre_count += 1;
                true
            }
            None => false,
        }
    }

    fn iter_genres(&self, offset: usize, count: usize) -> GenreIter<'_> {
        GenreIter {
            arena: &self.str_data,
            offset,
            remaining: count,
        }
    }

    /// Requires all five has-flags; returns a borrow valid until the next
    /// mutation of `self`.
    pub fn take_current_movie(&self) -> Option<MovieRef<'_>> {
        if !(self.current.has.id
            && self.current.has.title
            && self.current.has.director
            && self.current.has.release_year
            && self.current.has.genres)
        {
            return None;
        }
        Some(MovieRef {
            id: self.current.id,
            title: self.slice(self.current.title),
            director: self.slice(self.current.director),
            release_year: self.current.release_year,
            arena: self,
            genre_start: self.current.genre_start,
            genre_count: self.current.genre_count,
        })
    }

    /// Requires `has_id && has_title`.
    pub fn take_current_summary(&self) -> Option<MovieSummary> {
        if !(self.current.has.id && self.current.has.title) {
            return None;
        }
        Some(MovieSummary {
            id: self.current.id,
            title: self.slice(self.current.title).to_owned(),
        })
    }

    /// Push the current record onto the list as a movie descriptor and clear
    /// the has-flags so a new record can be assembled in the same arena.
    /// Requires the same five fields as [`Builder::take_current_movie`].
    pub fn add_current_to_list_as_movie(&mut self) -> bool {
        if self.take_current_movie().is_none() {
            return false;
        }
        self.list.push(Descriptor::Movie {
            id: self.current.id,
            release_year: self.current.release_year,
            title: self.current.title,
            director: self.current.director,
            genre_start: self.current.genre_start,
            genre_count: self.current.genre_count,
        });
        self.current.has.clear();
        true
    }

    pub fn add_current_to_list_as_summary(&mut self) -> bool {
        if self.take_current_summary().is_none() {
            return false;
        }
        self.list.push(Descriptor::Summary {
            id: self.current.id,
            title: self.current.title,
        });
        self.current.has.clear();
        true
    }

    /// Consume the list, materializing owned records by duplicating arena
    /// slices. The builder is usable again after `reset`.
    pub fn take_movie_list(&mut self) -> Vec<Movie> {
        let out = self
            .list
            .drain(..)
            .filter_map(|d| match d {
                Descriptor::Movie {
                    id,
                    release_year,
                    title,
                    director,
                    genre_start,
                    genre_count,
                } => Some(Movie {
                    id,
                    title: self.slice(title).to_owned(),
                    director: self.slice(director).to_owned(),
                    release_year,
                    genres: self
                        .iter_genres(genre_start, genre_count)
                        .map(str::to_owned)
                        .collect(),
                }),
                Descriptor::Summary { .. } => None,
            })
            .collect();
        out
    }

    pub fn take_summary_list(&mut self) -> Vec<MovieSummary> {
        let out = self
            .list
            .drain(..)
            .filter_map(|d| match d {
                Descriptor::Summary { id, title } => Some(MovieSummary {
                    id,
                    title: self.slice(title).to_owned(),
                }),
                Descriptor::Movie { .. } => None,
            })
            .collect();
        out
    }
}

struct GenreIter<'a> {
    arena: &'a [u8],
    offset: usize,
    remaining: usize,
}

impl<'a> Iterator for GenreIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let start = self.offset;
        let nul = self.arena[start..]
            .iter()
            .position(|&b| b == 0)
            .expect("genre entries are always NUL-terminated");
        let s = std::str::from_utf8(&self.arena[start..start + nul])
            .expect("arena slices are always valid UTF-8 on insertion");
        self.offset = start + nul + 1;
        self.remaining -= 1;
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_a_single_movie() {
        let mut b = Builder::new();
        b.reset();
        assert!(b.set_id(1));
        assert!(b.set_title(b"Inception"));
        assert!(b.set_director(b"Christopher Nolan"));
        assert!(b.set_release_year(2010));
        assert!(b.start_genres());
        assert!(b.add_genre(b"Action"));
        assert!(b.add_genre(b"Sci-Fi"));

        let m = b.take_current_movie().expect("all fields set");
        assert_eq!(m.id, 1);
        assert_eq!(m.title, "Inception");
        assert_eq!(m.director, "Christopher Nolan");
        assert_eq!(m.release_year, 2010);
        assert_eq!(m.genres().collect::<Vec<_>>(), vec!["Action", "Sci-Fi"]);
    }

    #[test]
    fn take_current_movie_requires_all_fields() {
        let mut b = Builder::new();
        b.set_id(1);
        b.set_title(b"X");
        assert!(b.take_current_movie().is_none());
    }

    #[test]
    fn reset_invalidates_and_allows_reuse() {
        let mut b = Builder::new();
        b.set_id(1);
        b.set_title(b"A");
        b.set_director(b"B");
        b.set_release_year(1999);
        b.start_genres();
        b.reset();
        assert!(!b.has_id());
        assert!(b.set_id(2));
        assert!(b.set_title(b"C"));
        assert!(b.set_director(b"D"));
        assert!(b.set_release_year(2000));
        assert!(b.start_genres());
        let m = b.take_current_movie().expect("fresh record complete");
        assert_eq!(m.id, 2);
        assert_eq!(m.title, "C");
    }

    #[test]
    fn list_accumulates_multiple_movies_in_one_arena() {
        let mut b = Builder::new();
        b.reset();
        for i in 0..3i64 {
            b.set_id(i);
            b.set_title(format!("title-{i}").as_bytes());
            b.set_director(format!("director-{i}").as_bytes());
            b.set_release_year(2000 + i as i32);
            b.start_genres();
            b.add_genre(b"Drama");
            assert!(b.add_current_to_list_as_movie());
        }
        let movies = b.take_movie_list();
        assert_eq!(movies.len(), 3);
        assert_eq!(movies[1].title, "title-1");
        assert_eq!(movies[2].genres, vec!["Drama".to_string()]);
    }

    #[test]
    fn summary_list_round_trips() {
        let mut b = Builder::new();
        b.reset();
        b.set_id(7);
        b.set_title(b"Arrival");
        assert!(b.add_current_to_list_as_summary());
        let list = b.take_summary_list();
        assert_eq!(list, vec![MovieSummary { id: 7, title: "Arrival".into() }]);
    }
}
