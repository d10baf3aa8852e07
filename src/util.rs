//! Shared text helpers.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

// CSI sequences (colors, cursor movement) and OSC sequences (titles, links)
static ANSI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]").unwrap()
});

/// Truncate a string to at most `max_chars` characters, ending in "..." when cut.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Remove terminal escape sequences and stray control characters.
pub fn strip_ansi(line: &str) -> String {
    ANSI_REGEX
        .replace_all(line, "")
        .chars()
        .filter(|c| !c.is_control() || *c == '\t')
        .collect()
}

/// Format as `Xs`, or `Xm Ys` from one minute on.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// Default detail enhancer: append elapsed time to a status line.
pub fn append_elapsed(detail: &str, elapsed: Duration) -> String {
    format!("{} ({} elapsed)", detail, format_elapsed(elapsed))
}
