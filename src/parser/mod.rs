//! Component D — Streaming YAML Parser.
//!
//! Turns a byte stream from a socket into a sequence of [`Operation`]s
//! without buffering the whole document (spec §4.D). The top-level state
//! machine lives here; the two sub-parsers (`parse_movie`, `parse_movie_key`)
//! live in their own modules and are dispatched to by operation key.

pub mod errbuf;
pub mod events;
pub mod key;
pub mod movie;

use std::io::Read;

use saphyr_parser::{Event, Parser};

use crate::builder::Builder;
use crate::model::{resolve_operation_key, Operation};

use errbuf::ErrorBuf;
use events::{line_col, next_event, IoErrorSlot, SocketInput};

/// What a sub-parser produced.
///
/// `Fatal` means the underlying event stream cannot be trusted any further
/// (I/O failure, or the scanner has nothing left at all) — the whole
/// session is done, not just the current operation.
pub(crate) enum Outcome<T> {
    Ready(T),
    Recovered(String),
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InMapping,
}

/// Drives one client session's worth of [`Operation`]s off a socket.
///
/// Owns its YAML event state, its private [`Builder`], and its private
/// error-message buffer (spec §3, "A `Parser` (D) exclusively owns..."). The
/// `'_` on every [`Operation`] returned by [`OperationParser::next_op`] ties
/// that operation's borrowed strings to this parser, which is exactly the
/// "valid until the next `next_op` call" rule spec §3 states in words.
pub struct OperationParser<R: Read> {
    parser: Parser<'static, SocketInput<R>>,
    io_error: IoErrorSlot,
    builder: Builder,
    errbuf: ErrorBuf,
    state: State,
    done: bool,
}

impl<R: Read> OperationParser<R> {
    pub fn new(socket: R) -> Self {
        let (input, io_error) = SocketInput::new(socket);
        OperationParser {
            parser: Parser::new(input),
            io_error,
            builder: Builder::new(),
            errbuf: ErrorBuf::new(),
            state: State::Idle,
            done: false,
        }
    }

    /// Read and return one operation. Once the stream is exhausted or a
    /// fatal error has occurred, always returns [`Operation::ParseDone`].
    pub fn next_op(&mut self) -> Operation<'_> {
        if self.done {
            return Operation::ParseDone;
        }
        loop {
            match self.state {
                State::Idle => {
                    let positioned = match next_event(&mut self.parser) {
                        Ok(Some(p)) => p,
                        Ok(None) => {
                            self.done = true;
                            return Operation::ParseDone;
                        }
                        Err(e) => {
                            self.done = true;
                            return Operation::ParseError {
                                message: self.scan_error_message(&e),
                            };
                        }
                    };
                    match positioned.event {
                        Event::MappingStart(..) => {
                            self.state = State::InMapping;
                        }
                        Event::StreamEnd => {
                            self.done = true;
                            return Operation::ParseDone;
                        }
                        Event::Scalar(ref text, ..) => {
                            match resolve_operation_key(text) {
                                Some("list_movies") => return Operation::ListMovies,
                                Some("list_summaries") => return Operation::ListSummaries,
                                Some(_) => {
                                    let (line, col) = line_col(&positioned.marker);
                                    let message = self
                                        .errbuf
                                        .format_at("operation requires a mapping value", line, col)
                                        .to_owned();
                                    return Operation::ParseError { message };
                                }
                                None => {
                                    let (line, col) = line_col(&positioned.marker);
                                    let message = self
                                        .errbuf
                                        .format_at("unknown operation", line, col)
                                        .to_owned();
                                    return Operation::ParseError { message };
                                }
                            }
                        }
                        _ => {
                            let (line, col) = line_col(&positioned.marker);
                            let message = self
                                .errbuf
                                .format_at("expected an operation key or mapping", line, col)
                                .to_owned();
                            return Operation::ParseError { message };
                        }
                    }
                }
                State::InMapping => {
                    let key_ev = match next_event(&mut self.parser) {
                        Ok(Some(p)) => p,
                        Ok(None) => {
                            self.done = true;
                            return Operation::ParseDone;
                        }
                        Err(e) => {
                            self.done = true;
                            return Operation::ParseError {
                                message: self.scan_error_message(&e),
                            };
                        }
                    };
                    match key_ev.event {
                        Event::MappingEnd => {
                            self.state = State::Idle;
                            continue;
                        }
                        Event::Scalar(ref key_text, ..) => {
                            let op_name = match resolve_operation_key(key_text) {
                                Some(name) => name,
                                None => {
                                    let (line, col) = line_col(&key_ev.marker);
                                    let message = self
                                        .errbuf
                                        .format_at("unknown operation", line, col)
                                        .to_owned();
                                    if !recover_balance(&mut self.parser) {
                                        self.done = true;
                                    }
                                    return Operation::ParseError { message };
                                }
                            };
                            return self.dispatch(op_name);
                        }
                        _ => {
                            let (line, col) = line_col(&key_ev.marker);
                            let message = self
                                .errbuf
                                .format_at("expected an operation key", line, col)
                                .to_owned();
                            if !recover_balance(&mut self.parser) {
                                self.done = true;
                            }
                            return Operation::ParseError { message };
                        }
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, op_name: &'static str) -> Operation<'_> {
        match op_name {
            "add_movie" => match movie::parse_movie(&mut self.parser, &mut self.builder, &mut self.errbuf) {
                Outcome::Ready(()) => match self.builder.take_current_movie() {
                    Some(m) => Operation::AddMovie {
                        movie: m.to_owned_movie(),
                    },
                    None => unreachable!("parse_movie only returns Ready once every field is set"),
                },
                Outcome::Recovered(message) => Operation::ParseError { message },
                Outcome::Fatal => {
                    self.done = true;
                    Operation::ParseDone
                }
            },
            "add_genre" => {
                match key::parse_movie_key(&mut self.parser, &mut self.builder, &mut self.errbuf, true, true) {
                    Outcome::Ready(fields) => {
                        let movie_id = fields.id.expect("needs_id requires id to be set");
                        Operation::AddGenre {
                            movie_id,
                            genre: self.builder.scratch(),
                        }
                    }
                    Outcome::Recovered(message) => Operation::ParseError { message },
                    Outcome::Fatal => {
                        self.done = true;
                        Operation::ParseDone
                    }
                }
            }
            "remove_movie" => {
                match key::parse_movie_key(&mut self.parser, &mut self.builder, &mut self.errbuf, true, false) {
                    Outcome::Ready(fields) => Operation::RemoveMovie {
                        movie_id: fields.id.expect("needs_id requires id to be set"),
                    },
                    Outcome::Recovered(message) => Operation::ParseError { message },
                    Outcome::Fatal => {
                        self.done = true;
                        Operation::ParseDone
                    }
                }
            }
            "get_movie" => {
                match key::parse_movie_key(&mut self.parser, &mut self.builder, &mut self.errbuf, true, false) {
                    Outcome::Ready(fields) => Operation::GetMovie {
                        movie_id: fields.id.expect("needs_id requires id to be set"),
                    },
                    Outcome::Recovered(message) => Operation::ParseError { message },
                    Outcome::Fatal => {
                        self.done = true;
                        Operation::ParseDone
                    }
                }
            }
            "search_by_genre" => {
                match key::parse_movie_key(&mut self.parser, &mut self.builder, &mut self.errbuf, false, true) {
                    Outcome::Ready(_) => Operation::SearchByGenre {
                        genre: self.builder.scratch(),
                    },
                    Outcome::Recovered(message) => Operation::ParseError { message },
                    Outcome::Fatal => {
                        self.done = true;
                        Operation::ParseDone
                    }
                }
            }
            "list_movies" => {
                self.skip_value();
                Operation::ListMovies
            }
            "list_summaries" => {
                self.skip_value();
                Operation::ListSummaries
            }
            other => unreachable!("resolve_operation_key returned an unhandled name {other}"),
        }
    }

    /// `list_movies`/`list_summaries` take no fields; consume whatever value
    /// follows the key (commonly a null scalar, but tolerate a stray
    /// mapping/sequence too) so the enclosing mapping stays balanced.
    fn skip_value(&mut self) {
        match next_event(&mut self.parser) {
            Ok(Some(p)) => match p.event {
                Event::MappingStart(..) | Event::SequenceStart(..) => {
                    if !recover_balance(&mut self.parser) {
                        self.done = true;
                    }
                }
                Event::StreamEnd => self.done = true,
                _ => {}
            },
            Ok(None) | Err(_) => self.done = true,
        }
    }

    fn scan_error_message(&mut self, e: &saphyr_parser::ScanError) -> String {
        if let Some(io_err) = self.io_error.borrow_mut().take() {
            self.errbuf.format_plain(&io_err.to_string()).to_owned()
        } else {
            let marker = e.marker();
            let (line, col) = line_col(marker);
            self.errbuf.format_at(&e.info().to_string(), line, col).to_owned()
        }
    }
}

/// Consume events until the balance of mappings/sequences opened since entry
/// returns to zero — i.e. until the `MappingEnd`/`SequenceEnd` that closes
/// the structure the caller was already inside when the mismatch was found
/// (spec §4.D, "Error recovery"). Returns `false` if the stream ends or
/// errors before that point, in which case the session is over.
///
/// `start_depth` lets a caller that has already consumed one more open event
/// than it accounted for (e.g. it read a value expecting a scalar but got a
/// `MappingStart`) fold that into the count instead of bailing out one
/// `MappingEnd` early. Ordinary callers pass 1: the enclosing structure they
/// were already inside when the mismatch was discovered.
pub(crate) fn recover_balance<R: Read>(parser: &mut Parser<'static, SocketInput<R>>) -> bool {
    recover_balance_from(parser, 1)
}

/// How much `recover_balance_from` should start counting at, given an
/// already-consumed event that turned out not to be the scalar a sub-parser
/// expected: 2 if that event itself opened a mapping/sequence (it nests
/// inside the enclosing structure), 1 otherwise.
pub(crate) fn value_depth(event: &Event<'static>) -> i32 {
    match event {
        Event::MappingStart(..) | Event::SequenceStart(..) => 2,
        _ => 1,
    }
}

pub(crate) fn recover_balance_from<R: Read>(parser: &mut Parser<'static, SocketInput<R>>, start_depth: i32) -> bool {
    let mut depth: i32 = start_depth;
    loop {
        match next_event(parser) {
            Ok(Some(p)) => match p.event {
                Event::MappingStart(..) | Event::SequenceStart(..) => depth += 1,
                Event::MappingEnd | Event::SequenceEnd => {
                    depth -= 1;
                    if depth == 0 {
                        return true;
                    }
                }
                Event::StreamEnd => return false,
                _ => {}
            },
            Ok(None) | Err(_) => return false,
        }
    }
}
