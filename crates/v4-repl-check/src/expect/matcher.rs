//! Pattern matching engine for expect operations.
//!
//! Combines the output buffer with a pattern and a deadline. A successful
//! match consumes everything up to and including the matched text, so the
//! next expectation only sees output that arrived afterwards.

use std::time::{Duration, Instant};

use super::buffer::OutputBuffer;
use super::pattern::{Pattern, PatternMatch};
use crate::types::Match;

/// The pattern matching engine.
#[derive(Debug, Clone)]
pub struct Matcher {
    buffer: OutputBuffer,
}

impl Matcher {
    /// Create a new matcher with the specified buffer size.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer: OutputBuffer::new(buffer_size),
        }
    }

    /// Append data to the buffer.
    pub fn append(&mut self, data: &[u8]) {
        self.buffer.append(data);
    }

    /// Get the current buffer.
    #[must_use]
    pub const fn buffer(&self) -> &OutputBuffer {
        &self.buffer
    }

    /// Get the current buffer contents as a string.
    #[must_use]
    pub fn buffer_str(&mut self) -> String {
        self.buffer.as_str_lossy()
    }

    /// Try to match a pattern against the buffered text.
    #[must_use]
    pub fn try_match(&mut self, pattern: &Pattern) -> Option<PatternMatch> {
        pattern.matches(self.buffer.text())
    }

    /// Consume matched content from the buffer and return a Match.
    pub fn consume_match(&mut self, result: &PatternMatch) -> Match {
        let before = self.buffer.consume(result.start);
        let matched = self.buffer.consume(result.len());
        let after = self.buffer_str();

        Match::new(matched, before, after).with_captures(result.captures.clone())
    }

    /// Drain everything that is buffered, as the `before` of an EOF match.
    pub fn consume_all(&mut self) -> Match {
        let before = self.buffer.as_str_lossy();
        self.buffer.clear();
        Match::new(String::new(), before, String::new())
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(super::buffer::DEFAULT_CAPACITY)
    }
}

/// Deadline bookkeeping for one expect call.
///
/// The deadline is fixed when the call starts; every read waits at most for
/// the time that is left.
#[derive(Debug, Clone)]
pub struct ExpectState {
    pattern: Pattern,
    start_time: Instant,
    timeout: Duration,
}

impl ExpectState {
    /// Create a new expect state.
    #[must_use]
    pub fn new(pattern: Pattern, timeout: Duration) -> Self {
        Self {
            pattern,
            start_time: Instant::now(),
            timeout,
        }
    }

    /// Check if the operation has timed out.
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        self.start_time.elapsed() >= self.timeout
    }

    /// Get the remaining time until timeout.
    #[must_use]
    pub fn remaining_time(&self) -> Duration {
        self.timeout.saturating_sub(self.start_time.elapsed())
    }

    /// The configured timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the pattern.
    #[must_use]
    pub const fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Check if the pattern is EOF.
    #[must_use]
    pub const fn expects_eof(&self) -> bool {
        self.pattern.is_eof()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matcher_literal() {
        let mut matcher = Matcher::new(1024);
        matcher.append(b"v4> 1 2 + ok");

        let m = matcher.try_match(&Pattern::literal("ok")).unwrap();
        assert_eq!(m.start, 10);
        assert_eq!(m.end, 12);
    }

    #[test]
    fn matcher_regex() {
        let mut matcher = Matcher::new(1024);
        matcher.append(b"V4 REPL v0.3.1");

        let m = matcher.try_match(&Pattern::regex(r"v\d+").unwrap()).unwrap();
        assert_eq!(m.start, 8);
        assert_eq!(m.end, 10);
    }

    #[test]
    fn matcher_consume() {
        let mut matcher = Matcher::new(1024);
        matcher.append(b"Resetting device...\nDevice ready\n\nv4> ");

        let result = matcher.try_match(&Pattern::literal("Device ready")).unwrap();
        let m = matcher.consume_match(&result);

        assert_eq!(m.before, "Resetting device...\n");
        assert_eq!(m.matched, "Device ready");
        assert_eq!(m.after, "\n\nv4> ");
        assert_eq!(matcher.buffer_str(), "\n\nv4> ");
    }

    #[test]
    fn consumed_output_does_not_match_again() {
        let mut matcher = Matcher::new(1024);
        matcher.append(b" ok\nv4> ");

        let first = matcher.try_match(&Pattern::literal("ok")).unwrap();
        matcher.consume_match(&first);
        assert!(matcher.try_match(&Pattern::literal("ok")).is_none());

        matcher.append(b" ok\n");
        assert!(matcher.try_match(&Pattern::literal("ok")).is_some());
    }

    #[test]
    fn consume_all_drains_buffer() {
        let mut matcher = Matcher::new(1024);
        matcher.append(b"Goodbye!\n");
        let m = matcher.consume_all();
        assert_eq!(m.before, "Goodbye!\n");
        assert!(matcher.buffer().is_empty());
    }

    #[test]
    fn expect_state_timeout() {
        let state = ExpectState::new(Pattern::literal("ok"), Duration::from_millis(10));

        assert!(!state.is_timed_out());
        assert!(state.remaining_time() <= Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(20));
        assert!(state.is_timed_out());
        assert_eq!(state.remaining_time(), Duration::ZERO);
    }

    #[test]
    fn expect_state_eof() {
        assert!(ExpectState::new(Pattern::eof(), Duration::from_secs(1)).expects_eof());
        assert!(!ExpectState::new("ok".into(), Duration::from_secs(1)).expects_eof());
    }
}
