//! `git clone --progress` output.
//!
//! Receiving objects covers 0-80% of the step and resolving deltas 80-100%;
//! the counting and compressing phases are reported as status lines.

use std::sync::LazyLock;

use regex::Regex;

use super::{ParsedLine, percent_value};

const RECEIVE_SHARE: u32 = 80;

static RECEIVING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Receiving objects:\s+(\d{1,3})%").unwrap());

static RESOLVING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Resolving deltas:\s+(\d{1,3})%").unwrap());

static PHASE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Counting|Compressing|Enumerating) objects").unwrap());

static CLONING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Cloning into '([^']+)'").unwrap());

pub fn parse(line: &str) -> ParsedLine {
    if let Some(raw) = capture(&RECEIVING_REGEX, line) {
        return ParsedLine::Percent {
            percent: scale(raw, 0, RECEIVE_SHARE),
            detail: line.to_string(),
        };
    }

    if let Some(raw) = capture(&RESOLVING_REGEX, line) {
        return ParsedLine::Percent {
            percent: scale(raw, RECEIVE_SHARE, 100),
            detail: line.to_string(),
        };
    }

    if let Some(caps) = PHASE_REGEX.captures(line) {
        return ParsedLine::Status(format!("{} objects...", &caps[1]));
    }

    if let Some(caps) = CLONING_REGEX.captures(line) {
        return ParsedLine::Status(format!("Cloning into {}...", &caps[1]));
    }

    ParsedLine::Unrecognized
}

fn capture(regex: &Regex, line: &str) -> Option<u8> {
    regex
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| percent_value(m.as_str()))
}

/// Map a phase-local percent into `from..=to` of the step.
fn scale(phase_percent: u8, from: u32, to: u32) -> u8 {
    let span = to - from;
    (from + u32::from(phase_percent.min(100)) * span / 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receiving_maps_into_first_eighty_percent() {
        assert!(matches!(
            parse("Receiving objects:  50% (500/1000), 1.20 MiB | 2.00 MiB/s"),
            ParsedLine::Percent { percent: 40, .. }
        ));
        assert!(matches!(
            parse("Receiving objects: 100% (1000/1000), done."),
            ParsedLine::Percent { percent: 80, .. }
        ));
    }

    #[test]
    fn test_resolving_maps_into_last_twenty_percent() {
        assert!(matches!(
            parse("Resolving deltas:   0% (0/200)"),
            ParsedLine::Percent { percent: 80, .. }
        ));
        assert!(matches!(
            parse("Resolving deltas:  50% (100/200)"),
            ParsedLine::Percent { percent: 90, .. }
        ));
        assert!(matches!(
            parse("Resolving deltas: 100% (200/200), done."),
            ParsedLine::Percent { percent: 100, .. }
        ));
    }

    #[test]
    fn test_phase_lines_are_stable_status() {
        assert_eq!(
            parse("remote: Counting objects:  12% (12/100)"),
            ParsedLine::Status("Counting objects...".into())
        );
        assert_eq!(
            parse("remote: Counting objects:  99% (99/100)"),
            ParsedLine::Status("Counting objects...".into())
        );
        assert_eq!(
            parse("Cloning into 'mesh'..."),
            ParsedLine::Status("Cloning into mesh...".into())
        );
    }

    #[test]
    fn test_unrelated_line() {
        assert_eq!(parse("warning: redirecting to https://x"), ParsedLine::Unrecognized);
    }
}
