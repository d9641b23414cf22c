//! Text format (`.usda`) reader and writer.

use std::borrow::Cow;
use std::collections::HashMap;

use anyhow::Result;

use crate::sdf;

pub mod parser;
pub mod token;
mod writer;

pub use writer::TextWriter;

/// Parse `.usda` text into specs keyed by path.
///
/// Errors carry the offending line with a caret under the last token read.
pub fn parse(text: &str) -> Result<HashMap<sdf::Path, sdf::Spec>> {
    let mut parser = parser::Parser::new(text);
    parser.parse().map_err(|err| match parser.location() {
        Some(location) => err.context(format!("at {location}")),
        None => err,
    })
}

/// Resolve the escape sequences of a quoted string literal.
pub fn unescape(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\\') {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Cow::Owned(out)
}

/// Quote `text` as a string literal, escaping what [`unescape`] resolves.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
