//! A per-parser reusable buffer for formatting `ParseError` text.
//!
//! Spec §4.D: `"<problem> at <line>:<col>"` (with optional context); the
//! returned text borrows from this buffer and is valid until the next
//! `next_op` call, mirroring the arena-reuse discipline of [`crate::builder`].

#[derive(Debug, Default)]
pub struct ErrorBuf {
    text: String,
}

impl ErrorBuf {
    pub fn new() -> Self {
        ErrorBuf::default()
    }

    /// Format `problem` with a 1-based line/column and overwrite the buffer.
    pub fn format_at(&mut self, problem: &str, line: usize, col: usize) -> &str {
        self.text.clear();
        use std::fmt::Write;
        let _ = write!(self.text, "{problem} at {line}:{col}");
        &self.text
    }

    /// Format `problem` with extra context appended, still positioned.
    pub fn format_at_with_context(
        &mut self,
        problem: &str,
        line: usize,
        col: usize,
        context: &str,
    ) -> &str {
        self.text.clear();
        use std::fmt::Write;
        let _ = write!(self.text, "{problem} at {line}:{col} ({context})");
        &self.text
    }

    /// Format a problem with no position information (I/O failures carry
    /// the underlying library's text verbatim).
    pub fn format_plain(&mut self, problem: &str) -> &str {
        self.text.clear();
        self.text.push_str(problem);
        &self.text
    }
}
