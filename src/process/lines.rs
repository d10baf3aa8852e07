use crate::util::strip_ansi;

/// Splits a byte stream into display lines.
///
/// Both `\n` and a bare `\r` end a line, so progress meters that redraw in
/// place (`git clone --progress`, download bars) yield one line per redraw.
/// Lines are stripped of escape sequences and trimmed; empty lines are dropped.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every line it completed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' || byte == b'\r' {
                self.flush_into(&mut lines);
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Return the trailing partial line, if any.
    pub fn finish(&mut self) -> Option<String> {
        let mut lines = Vec::new();
        self.flush_into(&mut lines);
        lines.pop()
    }

    fn flush_into(&mut self, lines: &mut Vec<String>) {
        if self.pending.is_empty() {
            return;
        }
        let raw = String::from_utf8_lossy(&self.pending);
        let cleaned = strip_ansi(&raw);
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_newlines() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"one\ntwo\n"), vec!["one", "two"]);
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_carriage_return_redraws_become_lines() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"Receiving objects:  10%\rReceiving objects:  55%\r");
        assert_eq!(lines, vec!["Receiving objects:  10%", "Receiving objects:  55%"]);
    }

    #[test]
    fn test_crlf_yields_single_line() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"done\r\n"), vec!["done"]);
    }

    #[test]
    fn test_partial_lines_carry_across_chunks() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"Downloa").is_empty());
        assert_eq!(splitter.push(b"ding: 40%\nExtr"), vec!["Downloading: 40%"]);
        assert_eq!(splitter.finish(), Some("Extr".to_string()));
    }

    #[test]
    fn test_strips_escape_sequences_and_blank_lines() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"\x1b[1mbold\x1b[0m\n   \n\n");
        assert_eq!(lines, vec!["bold"]);
    }
}
