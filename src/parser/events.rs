//! Adapts a blocking socket read into the pull-based character source the
//! YAML scanner consumes, and surfaces source positions for error text.
//!
//! Spec §4.D: "the parser calls the socket read as the YAML library
//! requests bytes." `saphyr_parser::Parser` pulls characters through the
//! `Input` trait one at a time; `SocketInput` implements that trait directly
//! over a `Read`, so the scanner's own pull drives the socket read — there
//! is no intermediate buffering of a whole document. A read returning zero
//! bytes is remembered and surfaces as end-of-input to the scanner from that
//! point on (spec: "a read returning zero bytes signals end-of-stream and
//! produces `ParseDone` on the next `next_op`").

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read};
use std::rc::Rc;

use saphyr_parser::{Event, Input, Marker, Parser, ScanError, Span};

/// One raw chunk read per underlying `read()` call.
const CHUNK: usize = 4096;

/// Shared slot an [`OperationParser`](super::OperationParser) polls after a
/// scan failure to tell "socket read failed" from "the YAML itself is
/// malformed" — `saphyr_parser::Input::next` has no way to return a
/// `Result`, so the error takes this side door instead.
pub type IoErrorSlot = Rc<RefCell<Option<io::Error>>>;

/// Pull-based byte source for the YAML scanner, backed by a blocking reader.
pub struct SocketInput<R> {
    reader: R,
    pending: VecDeque<u8>,
    raw_chunk: [u8; CHUNK],
    eof: bool,
    io_error: IoErrorSlot,
}

impl<R: Read> SocketInput<R> {
    /// Build a new input, returning it alongside a clone of its error slot
    /// for the caller to hold on to (the original moves into the parser).
    pub fn new(reader: R) -> (Self, IoErrorSlot) {
        let slot: IoErrorSlot = Rc::new(RefCell::new(None));
        let input = SocketInput {
            reader,
            pending: VecDeque::with_capacity(CHUNK),
            raw_chunk: [0u8; CHUNK],
            eof: false,
            io_error: slot.clone(),
        };
        (input, slot)
    }

    /// Perform one blocking read, topping up `pending`. Returns `false` once
    /// the stream is exhausted (cleanly or due to an error already
    /// recorded).
    fn fill(&mut self) -> bool {
        if self.eof {
            return false;
        }
        match self.reader.read(&mut self.raw_chunk) {
            Ok(0) => {
                self.eof = true;
                false
            }
            Ok(n) => {
                self.pending.extend(&self.raw_chunk[..n]);
                true
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => true,
            Err(e) => {
                *self.io_error.borrow_mut() = Some(e);
                self.eof = true;
                false
            }
        }
    }

    fn next_byte(&mut self) -> Option<u8> {
        loop {
            if let Some(b) = self.pending.pop_front() {
                return Some(b);
            }
            if !self.fill() {
                return None;
            }
        }
    }

    fn peek_byte(&mut self) -> Option<u8> {
        while self.pending.is_empty() {
            if !self.fill() {
                return None;
            }
        }
        self.pending.front().copied()
    }

    /// Decode one UTF-8 scalar value, reading as many continuation bytes as
    /// needed. Invalid UTF-8 is folded into an I/O-class error (the protocol
    /// requires UTF-8 text, spec §6).
    fn next_char(&mut self) -> Option<char> {
        let first = self.next_byte()?;
        let extra = utf8_continuation_bytes(first)?;
        let mut buf = [0u8; 4];
        buf[0] = first;
        for slot in buf.iter_mut().take(extra + 1).skip(1) {
            *slot = match self.next_byte() {
                Some(b) => b,
                None => {
                    *self.io_error.borrow_mut() = Some(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "truncated UTF-8 sequence at end of stream",
                    ));
                    return None;
                }
            };
        }
        match std::str::from_utf8(&buf[..extra + 1]) {
            Ok(s) => s.chars().next(),
            Err(_) => {
                *self.io_error.borrow_mut() = Some(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "invalid UTF-8 byte sequence",
                ));
                None
            }
        }
    }
}

fn utf8_continuation_bytes(first: u8) -> Option<usize> {
    match first {
        0x00..=0x7F => Some(0),
        0xC0..=0xDF => Some(1),
        0xE0..=0xEF => Some(2),
        0xF0..=0xF7 => Some(3),
        _ => None,
    }
}

impl<R: Read> Input for SocketInput<R> {
    fn next(&mut self) -> Option<char> {
        self.next_char()
    }

    fn peek(&mut self) -> Option<char> {
        // `peek_byte` only looks at the first pending byte; multi-byte
        // lookahead scalars are reconstructed by re-decoding without
        // consuming, which is safe because `pending` is not discarded here.
        let first = self.peek_byte()?;
        let extra = utf8_continuation_bytes(first)?;
        if self.pending.len() < extra + 1 {
            // Top up enough to decode the lookahead scalar without losing
            // already-buffered bytes.
            while self.pending.len() < extra + 1 {
                if !self.fill() {
                    break;
                }
            }
        }
        let bytes: Vec<u8> = self.pending.iter().take(extra + 1).copied().collect();
        std::str::from_utf8(&bytes).ok()?.chars().next()
    }
}

/// One event pulled from the stream, with its source position.
///
/// `Event` carries the lifetime of any borrowed scalar text (`Cow<'a,
/// str>`); `SocketInput` never hands the scanner a borrowed slice (every
/// character arrives decoded one at a time off the socket, never from a
/// buffer this parser could point back into), so every scalar the scanner
/// produces here is `Cow::Owned` and `'static` is simply the honest,
/// unconstrained lifetime to plug in — unlike a `&str`-backed input (see
/// the grounding file's `StrInput<'a>`), there is no shorter borrow to name.
pub struct PositionedEvent {
    pub event: Event<'static>,
    pub marker: Marker,
}

/// Pull the next logical event out of `parser`, skipping the document
/// boundary markers the top-level state machine doesn't care about (each
/// client operation may arrive as its own YAML document). `StreamEnd` is
/// passed through: the top level needs it to emit `ParseDone`.
///
/// Returns `Ok(None)` on clean end-of-input with no further tokens at all
/// (the scanner itself has nothing left, not even a `StreamEnd` — treated
/// the same as `StreamEnd` by the caller). `Err` signals a scan error, which
/// may in fact be an I/O failure surfaced by `SocketInput` — callers should
/// check the shared [`IoErrorSlot`] after this returns `Err` to tell the two
/// apart.
///
/// Driven through `Parser`'s `Iterator` impl (`Option<Result<(Event, Span),
/// ScanError>>`), the same way the grounding file's `LiveEvents::next_impl`
/// pulls from its own `Parser` (`while let Some(item) = self.parser.next()`).
pub fn next_event<R: Read>(
    parser: &mut Parser<'static, SocketInput<R>>,
) -> Result<Option<PositionedEvent>, ScanError> {
    loop {
        match parser.next() {
            None => return Ok(None),
            Some(Err(e)) => return Err(e),
            Some(Ok((Event::StreamStart, _)))
            | Some(Ok((Event::DocumentStart(_), _)))
            | Some(Ok((Event::DocumentEnd, _))) => continue,
            Some(Ok((event, span))) => {
                return Ok(Some(PositionedEvent {
                    event,
                    marker: span_start(&span),
                }))
            }
        }
    }
}

fn span_start(span: &Span) -> Marker {
    span.start
}

/// 1-based `(line, col)` for error text (spec §4.D: `"<problem> at
/// <line>:<col>"`).
pub fn line_col(marker: &Marker) -> (usize, usize) {
    (marker.line(), marker.col() + 1)
}
