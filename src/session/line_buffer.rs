//! Raw output chunks to complete lines

/// Accumulates bytes and yields complete lines. Line endings (`\n` or
/// `\r\n`) are stripped and invalid UTF-8 is replaced.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and drains every line it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            lines.push(decode(&self.pending[start..end]));
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Bytes of an unterminated trailing line
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Flushes the trailing partial line at end of stream
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = decode(&self.pending);
        self.pending.clear();
        Some(line)
    }
}

fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_across_chunks() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"Compiling A.sw").is_empty());
        assert_eq!(buffer.pending_len(), 14);

        let lines = buffer.push(b"ift (1/2)\nCompiling B");
        assert_eq!(lines, vec!["Compiling A.swift (1/2)"]);

        let lines = buffer.push(b".swift (2/2)\r\n** BUILD SUCCEEDED **\n");
        assert_eq!(lines, vec!["Compiling B.swift (2/2)", "** BUILD SUCCEEDED **"]);
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_trailing_partial_line_flushed() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"first\nno newline");
        assert_eq!(buffer.finish().as_deref(), Some("no newline"));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_empty_lines_and_invalid_utf8() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"\n\xffbad\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "");
        assert!(lines[1].ends_with("bad"));
    }
}
