//! Line-oriented trace record format
//!
//! One event per line, whitespace-separated:
//!
//! ```text
//! call: [<file>:<line>] <class> <method> <wall_clock> <cpu_clock>
//! return: <wall_clock> <cpu_clock>
//! ```
//!
//! The location token is written only when the call carries a location.
//! Whitespace inside a name or file path is written as `_` so every field
//! stays one token. Clock
//! values are printed with the shortest representation that parses back to the
//! same `f64`; exponential notation is accepted when reading.

use crate::types::events::{Call, Event, Return, Timestamps};
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

const CALL_PREFIX: &str = "call:";
const RETURN_PREFIX: &str = "return:";

#[derive(Error, Debug, PartialEq)]
pub enum TraceParseError {
    #[error("line {line_no}: unknown record type in {content:?}")]
    UnknownRecord { line_no: usize, content: String },

    #[error("line {line_no}: expected {expected} fields, found {found}")]
    FieldCount {
        line_no: usize,
        expected: &'static str,
        found: usize,
    },

    #[error("line {line_no}: invalid {field} {value:?}")]
    InvalidField {
        line_no: usize,
        field: &'static str,
        value: String,
    },
}

/// Render a single event as a trace line (without trailing newline)
pub fn render_line(event: &Event) -> String {
    match event {
        Event::Call(call) => render_call(call),
        Event::Return(ret) => render_return(ret),
    }
}

pub fn render_call(call: &Call) -> String {
    let mut out = String::with_capacity(64);
    out.push_str(CALL_PREFIX);
    if call.source_file.is_some() || call.source_line.is_some() {
        out.push(' ');
        push_token(&mut out, call.source_file.as_deref().unwrap_or(""));
        let _ = write!(out, ":{}", call.source_line.unwrap_or(0));
    }
    for name in [&call.class_name, &call.method_name] {
        out.push(' ');
        push_token(&mut out, name);
    }
    let _ = write!(out, " {} {}", call.wall_clock, call.cpu_clock);
    out
}

/// Append `value` as a single field: whitespace becomes `_` and an empty name
/// is written as `-`.
fn push_token(out: &mut String, value: &str) {
    if value.is_empty() {
        out.push('-');
        return;
    }
    out.extend(
        value
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c }),
    );
}

pub fn render_return(ret: &Return) -> String {
    format!("{} {} {}", RETURN_PREFIX, ret.wall_clock, ret.cpu_clock)
}

/// Parse a single trace line. `line_no` is only used for diagnostics.
pub fn parse_line(line: &str, line_no: usize) -> Result<Event, TraceParseError> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix(CALL_PREFIX) {
        let fields: Vec<&str> = rest.split_whitespace().collect();
        let (location, names) = match fields.len() {
            4 => (None, &fields[..]),
            5 => (Some(fields[0]), &fields[1..]),
            found => {
                return Err(TraceParseError::FieldCount {
                    line_no,
                    expected: "4 or 5",
                    found,
                })
            }
        };

        let (source_file, source_line) = match location {
            Some(token) => parse_location(token, line_no)?,
            None => (None, None),
        };
        let stamp = Timestamps::new(
            parse_clock(names[2], "wall clock", line_no)?,
            parse_clock(names[3], "cpu clock", line_no)?,
        );
        Ok(Event::Call(Call::new(
            names[0],
            names[1],
            source_file,
            source_line,
            stamp,
        )))
    } else if let Some(rest) = line.strip_prefix(RETURN_PREFIX) {
        let fields: Vec<&str> = rest.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(TraceParseError::FieldCount {
                line_no,
                expected: "2",
                found: fields.len(),
            });
        }
        Ok(Event::Return(Return::new(Timestamps::new(
            parse_clock(fields[0], "wall clock", line_no)?,
            parse_clock(fields[1], "cpu clock", line_no)?,
        ))))
    } else {
        Err(TraceParseError::UnknownRecord {
            line_no,
            content: line.to_string(),
        })
    }
}

/// Parse a whole trace. Blank lines are skipped; line numbers are 1-based.
pub fn parse_trace(contents: &str) -> Result<Vec<Event>, TraceParseError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| parse_line(line, idx + 1))
        .collect()
}

/// Read and parse a trace file written by the line sink
pub fn read_trace_file(path: impl AsRef<Path>) -> anyhow::Result<Vec<Event>> {
    use anyhow::Context;

    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace file: {}", path.display()))?;
    parse_trace(&contents).with_context(|| format!("Failed to parse trace file: {}", path.display()))
}

fn parse_location(
    token: &str,
    line_no: usize,
) -> Result<(Option<String>, Option<u32>), TraceParseError> {
    let invalid = || TraceParseError::InvalidField {
        line_no,
        field: "location",
        value: token.to_string(),
    };
    let (file, line) = token.rsplit_once(':').ok_or_else(invalid)?;
    let line: u32 = line.parse().map_err(|_| invalid())?;
    Ok((Some(file.to_string()), Some(line)))
}

fn parse_clock(value: &str, field: &'static str, line_no: usize) -> Result<f64, TraceParseError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| TraceParseError::InvalidField {
            line_no,
            field,
            value: value.to_string(),
        })
}
