//! `parse_movie` (spec §4.D).
//!
//! Expects a mapping with `title`, `director`, `release_year` (alias:
//! `year`), and `genres` (alias: `genre`, a sequence of scalars). Each key is
//! dispatched once; a repeated key is ignored after the first accepted
//! value. Completion requires all five [`Builder`] has-flags; `MappingEnd`
//! with any flag still unset is a `ParseError`.

use std::io::Read;

use saphyr_parser::{Event, Parser};

use crate::builder::Builder;

use super::errbuf::ErrorBuf;
use super::events::{line_col, next_event, SocketInput};
use super::{recover_balance, recover_balance_from, value_depth, Outcome};

fn parse_i32(text: &str) -> Option<i32> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<i32>().ok()
}

pub fn parse_movie<R: Read>(
    parser: &mut Parser<'static, SocketInput<R>>,
    builder: &mut Builder,
    errbuf: &mut ErrorBuf,
) -> Outcome<()> {
    let head = match next_event(parser) {
        Ok(Some(p)) => p,
        Ok(None) | Err(_) => return Outcome::Fatal,
    };
    if !matches!(head.event, Event::MappingStart(..)) {
        let (line, col) = line_col(&head.marker);
        return Outcome::Recovered(
            errbuf
                .format_at("add_movie requires a mapping value", line, col)
                .to_owned(),
        );
    }

    // Open Question #2 (spec §9): `add_movie` always assigns a fresh id;
    // any `id` field in the mapping is ignored (left unhandled by the
    // match below, so it falls through to the discard arm).
    builder.set_id(0);

    loop {
        let key_ev = match next_event(parser) {
            Ok(Some(p)) => p,
            Ok(None) | Err(_) => return Outcome::Fatal,
        };
        let key_text = match &key_ev.event {
            Event::MappingEnd => break,
            Event::Scalar(k, ..) => k.clone(),
            _ => {
                let (line, col) = line_col(&key_ev.marker);
                let message = errbuf.format_at("expected a field name", line, col).to_owned();
                if !recover_balance_from(parser, value_depth(&key_ev.event)) {
                    return Outcome::Fatal;
                }
                return Outcome::Recovered(message);
            }
        };

        match key_text.as_ref() {
            "title" if !builder.has_title() => {
                match read_scalar(parser, errbuf, "expected a scalar value for title") {
                    Ok(text) => {
                        if !builder.set_title(text.as_bytes()) {
                            return out_of_memory(builder, errbuf, &head);
                        }
                    }
                    Err(outcome) => return outcome,
                }
            }
            "director" if !builder.has_director() => {
                match read_scalar(parser, errbuf, "expected a scalar value for director") {
                    Ok(text) => {
                        if !builder.set_director(text.as_bytes()) {
                            return out_of_memory(builder, errbuf, &head);
                        }
                    }
                    Err(outcome) => return outcome,
                }
            }
            "release_year" | "year" if !builder.has_release_year() => {
                let value_ev = match next_event(parser) {
                    Ok(Some(p)) => p,
                    Ok(None) | Err(_) => return Outcome::Fatal,
                };
                let Event::Scalar(ref text, ..) = value_ev.event else {
                    let (line, col) = line_col(&value_ev.marker);
                    let message = errbuf
                        .format_at("expected a scalar value for release_year", line, col)
                        .to_owned();
                    if !recover_balance_from(parser, value_depth(&value_ev.event)) {
                        return Outcome::Fatal;
                    }
                    return Outcome::Recovered(message);
                };
                match parse_i32(text) {
                    Some(year) => {
                        builder.set_release_year(year);
                    }
                    None => {
                        let (line, col) = line_col(&value_ev.marker);
                        let message = errbuf
                            .format_at("invalid integer release_year", line, col)
                            .to_owned();
                        return Outcome::Recovered(message);
                    }
                }
            }
            "genres" | "genre" if !builder.has_genres() => {
                match parse_genre_sequence(parser, builder, errbuf) {
                    Ok(()) => {}
                    Err(outcome) => return outcome,
                }
            }
            // Already set once, or not a recognized key: consume and ignore
            // the value (duplicate keys keep the first value; unrecognized
            // keys are tolerated so forward-compatible clients don't break
            // every existing session).
            _ => {
                if let Err(outcome) = skip_one_value(parser) {
                    return outcome;
                }
            }
        }
    }

    let complete = builder.has_id()
        && builder.has_title()
        && builder.has_director()
        && builder.has_release_year()
        && builder.has_genres();
    if complete {
        Outcome::Ready(())
    } else {
        let (line, col) = line_col(&head.marker);
        let mut missing = Vec::new();
        if !builder.has_title() {
            missing.push("title");
        }
        if !builder.has_director() {
            missing.push("director");
        }
        if !builder.has_release_year() {
            missing.push("release_year");
        }
        if !builder.has_genres() {
            missing.push("genres");
        }
        Outcome::Recovered(
            errbuf
                .format_at_with_context(
                    "add_movie mapping is missing a required field",
                    line,
                    col,
                    &missing.join(", "),
                )
                .to_owned(),
        )
    }
}

fn read_scalar<R: Read>(
    parser: &mut Parser<'static, SocketInput<R>>,
    errbuf: &mut ErrorBuf,
    problem: &str,
) -> Result<String, Outcome<()>> {
    let value_ev = match next_event(parser) {
        Ok(Some(p)) => p,
        Ok(None) | Err(_) => return Err(Outcome::Fatal),
    };
    match value_ev.event {
        Event::Scalar(text, ..) => Ok(text.into_owned()),
        other => {
            let (line, col) = line_col(&value_ev.marker);
            let message = errbuf.format_at(problem, line, col).to_owned();
            if !recover_balance_from(parser, value_depth(&other)) {
                return Err(Outcome::Fatal);
            }
            Err(Outcome::Recovered(message))
        }
    }
}

fn parse_genre_sequence<R: Read>(
    parser: &mut Parser<'static, SocketInput<R>>,
    builder: &mut Builder,
    errbuf: &mut ErrorBuf,
) -> Result<(), Outcome<()>> {
    let head = match next_event(parser) {
        Ok(Some(p)) => p,
        Ok(None) | Err(_) => return Err(Outcome::Fatal),
    };
    if !matches!(head.event, Event::SequenceStart(..)) {
        let (line, col) = line_col(&head.marker);
        let message = errbuf
            .format_at("genres must be a sequence", line, col)
            .to_owned();
        if !recover_balance_from(parser, value_depth(&head.event)) {
            return Err(Outcome::Fatal);
        }
        return Err(Outcome::Recovered(message));
    }
    if !builder.start_genres() {
        let (line, col) = line_col(&head.marker);
        return Err(Outcome::Recovered(
            errbuf.format_at("out of memory", line, col).to_owned(),
        ));
    }
    loop {
        let item = match next_event(parser) {
            Ok(Some(p)) => p,
            Ok(None) | Err(_) => return Err(Outcome::Fatal),
        };
        match item.event {
            Event::SequenceEnd => return Ok(()),
            Event::Scalar(text, ..) => {
                if !builder.add_genre(text.as_bytes()) {
                    let (line, col) = line_col(&item.marker);
                    return Err(Outcome::Recovered(
                        errbuf.format_at("out of memory", line, col).to_owned(),
                    ));
                }
            }
            other => {
                let (line, col) = line_col(&item.marker);
                let message = errbuf
                    .format_at("genres entries must be scalars", line, col)
                    .to_owned();
                if !recover_balance_from(parser, value_depth(&other)) {
                    return Err(Outcome::Fatal);
                }
                return Err(Outcome::Recovered(message));
            }
        }
    }
}

/// Consume and discard one value (scalar, or a balanced mapping/sequence).
fn skip_one_value<R: Read>(parser: &mut Parser<'static, SocketInput<R>>) -> Result<(), Outcome<()>> {
    let ev = match next_event(parser) {
        Ok(Some(p)) => p,
        Ok(None) | Err(_) => return Err(Outcome::Fatal),
    };
    match ev.event {
        Event::MappingStart(..) | Event::SequenceStart(..) => {
            if !recover_balance(parser) {
                return Err(Outcome::Fatal);
            }
        }
        Event::StreamEnd => return Err(Outcome::Fatal),
        _ => {}
    }
    Ok(())
}

fn out_of_memory(
    _builder: &mut Builder,
    errbuf: &mut ErrorBuf,
    head: &super::events::PositionedEvent,
) -> Outcome<()> {
    let (line, col) = line_col(&head.marker);
    Outcome::Recovered(errbuf.format_at("out of memory", line, col).to_owned())
}
