//! Line parsers used by the exact strategy.
//!
//! Each parser turns one cleaned output line into a [`ParsedLine`]:
//! - a numeric percent with the detail text to show next to it
//! - a status line (meaningful state change without a number)
//! - nothing recognizable
//!
//! Tool-specific parsers ([`fnm`], [`git`]) are selected per step through
//! [`ProgressParser`]. Everything falls back to [`parse_generic`].

pub mod fnm;
pub mod git;

use std::sync::LazyLock;

use regex::Regex;

use crate::step::ProgressParser;

static PERCENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3}(?:\.\d+)?)\s*%").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Percent { percent: u8, detail: String },
    Status(String),
    Unrecognized,
}

/// Run the tool-specific parser for `parser`.
pub fn parse_with(parser: ProgressParser, line: &str) -> ParsedLine {
    match parser {
        ProgressParser::Fnm => fnm::parse(line),
        ProgressParser::Git => git::parse(line),
    }
}

/// Find the first `N%` anywhere in the line.
pub fn parse_generic(line: &str) -> ParsedLine {
    match first_percent(line) {
        Some(percent) => ParsedLine::Percent {
            percent,
            detail: line.to_string(),
        },
        None => ParsedLine::Unrecognized,
    }
}

/// Extract the first percentage in `text`, rounded and clamped to 100.
pub(crate) fn first_percent(text: &str) -> Option<u8> {
    let caps = PERCENT_REGEX.captures(text)?;
    percent_value(caps.get(1)?.as_str())
}

pub(crate) fn percent_value(raw: &str) -> Option<u8> {
    let value: f64 = raw.parse().ok()?;
    Some(value.round().clamp(0.0, 100.0) as u8)
}
