//! Incremental line decoding for child process output.

/// Longest line kept in the buffer before it is flushed as-is.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// Turns arbitrary read chunks into complete lines.
///
/// Both `\n` and `\r` terminate a line (progress bars redraw with `\r`).
/// Bytes after the last terminator are held until the next chunk or `finish`.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk; returns the lines it completed (empty lines dropped).
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        for &b in chunk {
            if b == b'\n' || b == b'\r' {
                self.flush_into(&mut out);
            } else {
                self.pending.push(b);
                if self.pending.len() >= MAX_LINE_BYTES {
                    self.flush_into(&mut out);
                }
            }
        }
        out
    }

    /// Returns the trailing partial line, if any (call at EOF).
    pub fn finish(mut self) -> Option<String> {
        let mut out = Vec::new();
        self.flush_into(&mut out);
        out.pop()
    }

    fn flush_into(&mut self, out: &mut Vec<String>) {
        if self.pending.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.pending).trim_end().to_string();
        self.pending.clear();
        if !line.is_empty() {
            out.push(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_lines_split_across_chunks() {
        let mut d = LineDecoder::new();
        assert!(d.feed(b"[download]  12.").is_empty());
        let lines = d.feed(b"5% of 3.00MiB\n[down");
        assert_eq!(lines, vec!["[download]  12.5% of 3.00MiB"]);
        let lines = d.feed(b"load] Destination: a.mp3\n");
        assert_eq!(lines, vec!["[download] Destination: a.mp3"]);
        assert!(d.finish().is_none());
    }

    #[test]
    fn carriage_returns_and_crlf() {
        let mut d = LineDecoder::new();
        let lines = d.feed(b"one\rtwo\r\nthree\n\n");
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[test]
    fn finish_returns_trailing_partial_line() {
        let mut d = LineDecoder::new();
        assert!(d.feed(b"ERROR: no newline").is_empty());
        assert_eq!(d.finish().as_deref(), Some("ERROR: no newline"));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_dropped() {
        let mut d = LineDecoder::new();
        let lines = d.feed(b"title \xff\xfe ok\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("title "));
        assert!(lines[0].ends_with(" ok"));
    }

    #[test]
    fn overlong_line_is_flushed() {
        let mut d = LineDecoder::new();
        let chunk = vec![b'a'; MAX_LINE_BYTES + 10];
        let lines = d.feed(&chunk);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), MAX_LINE_BYTES);
        assert_eq!(d.finish().map(|s| s.len()), Some(10));
    }
}
