/// Capture Stream and I/O Context
///
/// **Core Responsibility:**
/// Give candidate code an input source and an output sink that belong to
/// the harness, passed explicitly instead of swapping process-wide stdio.
///
/// **Critical Properties:**
/// - The capture is cleared at the start of every test case
/// - Reading past the last fed line is an end-of-input fault, never a block
/// - Nothing here is shared between cases; each case builds its own feed

use crate::fault::{Fault, FaultKind};
use std::collections::VecDeque;
use std::fmt;

/// Accumulates text written by candidate code.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CaptureStream {
    content: String,
}

impl CaptureStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_str(&mut self, text: &str) {
        self.content.push_str(text);
    }

    pub fn clear(&mut self) {
        self.content.clear();
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl fmt::Write for CaptureStream {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.content.push_str(s);
        Ok(())
    }
}

/// Line-oriented input channel fed from a test case.
#[derive(Debug, Default, Clone)]
pub struct InputFeed {
    lines: VecDeque<String>,
}

impl InputFeed {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The same block of lines fed `times` times in a row.
    pub fn repeated(lines: &[String], times: usize) -> Self {
        let mut feed = VecDeque::with_capacity(lines.len() * times);
        for _ in 0..times {
            feed.extend(lines.iter().cloned());
        }
        Self { lines: feed }
    }

    pub fn read_line(&mut self) -> Result<String, Fault> {
        self.lines
            .pop_front()
            .ok_or_else(|| Fault::new(FaultKind::EndOfInput, "EOF when reading a line"))
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }

    /// Copy of the lines not yet read.
    pub fn pending(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    /// Remaining lines joined with newlines, leaving the feed untouched.
    pub fn peek_joined(&self) -> String {
        self.lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }

    /// Drop the next `count` lines, as if they had been read.
    pub fn advance(&mut self, count: usize) {
        let count = count.min(self.lines.len());
        self.lines.drain(..count);
    }

    /// Remaining lines joined with newlines, draining the feed.
    pub fn drain_joined(&mut self) -> String {
        let joined = self.peek_joined();
        self.lines.clear();
        joined
    }
}

/// Input source and output sink handed to candidate code for one call.
pub struct IoContext<'a> {
    pub input: &'a mut InputFeed,
    pub output: &'a mut CaptureStream,
}

impl<'a> IoContext<'a> {
    pub fn new(input: &'a mut InputFeed, output: &'a mut CaptureStream) -> Self {
        Self { input, output }
    }

    pub fn read_line(&mut self) -> Result<String, Fault> {
        self.input.read_line()
    }

    /// Write `text` followed by a newline.
    pub fn print(&mut self, text: impl fmt::Display) {
        self.output.write_str(&format!("{}\n", text));
    }

    pub fn write(&mut self, text: &str) {
        self.output.write_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_accumulates_and_clears() {
        let mut capture = CaptureStream::new();
        capture.write_str("a");
        capture.write_str("b\n");
        assert_eq!(capture.content(), "ab\n");
        capture.clear();
        assert!(capture.is_empty());
    }

    #[test]
    fn test_read_past_end_is_eof_fault() {
        let mut feed = InputFeed::new(["1"]);
        assert_eq!(feed.read_line().unwrap(), "1");
        let fault = feed.read_line().unwrap_err();
        assert_eq!(fault.kind, FaultKind::EndOfInput);
    }

    #[test]
    fn test_repeated_feed() {
        let lines = vec!["a".to_string(), "b".to_string()];
        let mut feed = InputFeed::repeated(&lines, 2);
        assert_eq!(feed.remaining(), 4);
        assert_eq!(feed.read_line().unwrap(), "a");
        assert_eq!(feed.drain_joined(), "b\na\nb");
        assert_eq!(feed.remaining(), 0);
    }

    #[test]
    fn test_peek_then_advance() {
        let mut feed = InputFeed::new(["x", "y", "z"]);
        assert_eq!(feed.peek_joined(), "x\ny\nz");
        feed.advance(2);
        assert_eq!(feed.read_line().unwrap(), "z");
        feed.advance(5);
        assert_eq!(feed.remaining(), 0);
    }

    #[test]
    fn test_io_context_print() {
        let mut feed = InputFeed::new(["5"]);
        let mut capture = CaptureStream::new();
        let mut io = IoContext::new(&mut feed, &mut capture);
        let n: i64 = io.read_line().unwrap().parse().unwrap();
        io.print(n * 2);
        io.write("done");
        assert_eq!(capture.content(), "10\ndone");
    }
}
