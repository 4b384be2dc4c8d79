//! `parse_movie_key(needs_id, needs_genre)` (spec §4.D).
//!
//! Accepts either a compact scalar — when exactly one of `needs_id` /
//! `needs_genre` is set — or a mapping with `id` and/or `genre` (alias:
//! `name`). The genre string, when read, is written into the builder's
//! scratch slot rather than returned by value; callers read it back with
//! [`Builder::scratch`](crate::builder::Builder::scratch).

use std::io::Read;

use saphyr_parser::{Event, Parser};

use crate::builder::Builder;

use super::errbuf::ErrorBuf;
use super::events::{line_col, next_event, SocketInput};
use super::{recover_balance, recover_balance_from, value_depth, Outcome};

#[derive(Debug, Default)]
pub struct KeyFields {
    pub id: Option<i64>,
    pub has_genre: bool,
}

/// Parse a decimal `i64`, full range, rejecting empty input and any
/// trailing garbage (spec §4.D, "Integer parsing").
fn parse_i64(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<i64>().ok()
}

pub fn parse_movie_key<R: Read>(
    parser: &mut Parser<'static, SocketInput<R>>,
    builder: &mut Builder,
    errbuf: &mut ErrorBuf,
    needs_id: bool,
    needs_genre: bool,
) -> Outcome<KeyFields> {
    debug_assert!(needs_id || needs_genre, "at least one field must be requested");

    let head = match next_event(parser) {
        Ok(Some(p)) => p,
        Ok(None) | Err(_) => return Outcome::Fatal,
    };

    if let Event::Scalar(ref value, ..) = head.event {
        // Compact scalar form is only valid when exactly one field is
        // wanted; otherwise there is nowhere for the second field to live.
        if needs_id && !needs_genre {
            return match parse_i64(value) {
                Some(id) => Outcome::Ready(KeyFields {
                    id: Some(id),
                    has_genre: false,
                }),
                None => {
                    let (line, col) = line_col(&head.marker);
                    Outcome::Recovered(errbuf.format_at("invalid integer id", line, col).to_owned())
                }
            };
        }
        if needs_genre && !needs_id {
            return if builder.set_scratch(value.as_bytes()) {
                Outcome::Ready(KeyFields {
                    id: None,
                    has_genre: true,
                })
            } else {
                let (line, col) = line_col(&head.marker);
                Outcome::Recovered(errbuf.format_at("out of memory", line, col).to_owned())
            };
        }
        let (line, col) = line_col(&head.marker);
        return Outcome::Recovered(
            errbuf
                .format_at("expected a mapping with id and genre", line, col)
                .to_owned(),
        );
    }

    if !matches!(head.event, Event::MappingStart(..)) {
        let (line, col) = line_col(&head.marker);
        return Outcome::Recovered(errbuf.format_at("expected a scalar or mapping", line, col).to_owned());
    }
    let (head_line, head_col) = line_col(&head.marker);

    let mut fields = KeyFields::default();
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
            "id" => {
                let value_ev = match next_event(parser) {
                    Ok(Some(p)) => p,
                    Ok(None) | Err(_) => return Outcome::Fatal,
                };
                let Event::Scalar(ref text, ..) = value_ev.event else {
                    let (line, col) = line_col(&value_ev.marker);
                    let message = errbuf
                        .format_at("expected a scalar value for id", line, col)
                        .to_owned();
                    if !recover_balance_from(parser, value_depth(&value_ev.event)) {
                        return Outcome::Fatal;
                    }
                    return Outcome::Recovered(message);
                };
                if fields.id.is_none() {
                    match parse_i64(text) {
                        Some(parsed) => fields.id = Some(parsed),
                        None => {
                            let (line, col) = line_col(&value_ev.marker);
                            let message = errbuf.format_at("invalid integer id", line, col).to_owned();
                            if !recover_balance(parser) {
                                return Outcome::Fatal;
                            }
                            return Outcome::Recovered(message);
                        }
                    }
                }
            }
            "genre" | "name" => {
                let value_ev = match next_event(parser) {
                    Ok(Some(p)) => p,
                    Ok(None) | Err(_) => return Outcome::Fatal,
                };
                let Event::Scalar(ref text, ..) = value_ev.event else {
                    let (line, col) = line_col(&value_ev.marker);
                    let message = errbuf
                        .format_at("expected a scalar value for genre", line, col)
                        .to_owned();
                    if !recover_balance_from(parser, value_depth(&value_ev.event)) {
                        return Outcome::Fatal;
                    }
                    return Outcome::Recovered(message);
                };
                if !fields.has_genre {
                    if builder.set_scratch(text.as_bytes()) {
                        fields.has_genre = true;
                    } else {
                        let (line, col) = line_col(&value_ev.marker);
                        let message = errbuf.format_at("out of memory", line, col).to_owned();
                        if !recover_balance(parser) {
                            return Outcome::Fatal;
                        }
                        return Outcome::Recovered(message);
                    }
                }
            }
            _ => {
                let (line, col) = line_col(&key_ev.marker);
                let message = errbuf.format_at("unknown field", line, col).to_owned();
                if !recover_balance(parser) {
                    return Outcome::Fatal;
                }
                return Outcome::Recovered(message);
            }
        }
    }

    if (needs_id && fields.id.is_none()) || (needs_genre && !fields.has_genre) {
        let mut missing = Vec::new();
        if needs_id && fields.id.is_none() {
            missing.push("id");
        }
        if needs_genre && !fields.has_genre {
            missing.push("genre");
        }
        return Outcome::Recovered(
            errbuf
                .format_at_with_context(
                    "mapping is missing a required field",
                    head_line,
                    head_col,
                    &missing.join(", "),
                )
                .to_owned(),
        );
    }
    Outcome::Ready(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_i64_rejects_empty_and_garbage() {
        assert_eq!(parse_i64(""), None);
        assert_eq!(parse_i64("  "), None);
        assert_eq!(parse_i64("12x"), None);
        assert_eq!(parse_i64("x12"), None);
        assert_eq!(parse_i64("42"), Some(42));
        assert_eq!(parse_i64("-7"), Some(-7));
    }
}
