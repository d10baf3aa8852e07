//! Output vocabulary of the `fnm` Node.js version manager.

use std::sync::LazyLock;

use regex::Regex;

use super::{ParsedLine, percent_value};

static DOWNLOAD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)download(?:ing)?\b.*?(\d{1,3}(?:\.\d+)?)\s*%").unwrap()
});

static INSTALL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)installing\s+(?:node(?:\.js)?\s+)?(?:version\s+)?v?(\d+(?:\.\d+)*)").unwrap()
});

static EXTRACT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bextracting\b").unwrap());

static USING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)using\s+node(?:\.js)?\s+v?(\d+(?:\.\d+)*)").unwrap());

pub fn parse(line: &str) -> ParsedLine {
    if let Some(caps) = DOWNLOAD_REGEX.captures(line)
        && let Some(percent) = caps.get(1).and_then(|m| percent_value(m.as_str()))
    {
        return ParsedLine::Percent {
            percent,
            detail: format!("Downloading Node.js: {}%", percent),
        };
    }

    if let Some(caps) = INSTALL_REGEX.captures(line) {
        return ParsedLine::Status(format!("Installing Node v{}", &caps[1]));
    }

    if EXTRACT_REGEX.is_match(line) {
        return ParsedLine::Status("Extracting...".to_string());
    }

    if let Some(caps) = USING_REGEX.captures(line) {
        return ParsedLine::Status(format!("Using Node v{}", &caps[1]));
    }

    ParsedLine::Unrecognized
}
