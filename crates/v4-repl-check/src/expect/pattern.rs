//! Pattern types for expect operations.
//!
//! Literal substrings are the default; regular expressions are opt-in via
//! [`Pattern::regex`]. [`Pattern::Eof`] waits for the child to close its
//! output.

use regex::Regex;
use std::fmt;

/// A pattern that can be matched against REPL output.
#[derive(Clone)]
pub enum Pattern {
    /// Match an exact substring.
    Literal(String),

    /// Match a regular expression.
    Regex(CompiledRegex),

    /// Match end of file (process closed its output).
    Eof,
}

impl Pattern {
    /// Create a literal pattern.
    #[must_use]
    pub fn literal(s: impl Into<String>) -> Self {
        Self::Literal(s.into())
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self::Regex(CompiledRegex::new(pattern.to_string(), regex)))
    }

    /// Create an EOF pattern.
    #[must_use]
    pub const fn eof() -> Self {
        Self::Eof
    }

    /// Get the pattern as a string for display purposes.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) => s,
            Self::Regex(r) => r.pattern(),
            Self::Eof => "<EOF>",
        }
    }

    /// Check if this is an EOF pattern.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    /// Check if this pattern matches the given text.
    ///
    /// Returns the byte range and captures of the leftmost match.
    #[must_use]
    pub fn matches(&self, text: &str) -> Option<PatternMatch> {
        match self {
            Self::Literal(s) => text.find(s.as_str()).map(|pos| PatternMatch {
                start: pos,
                end: pos + s.len(),
                captures: Vec::new(),
            }),
            Self::Regex(r) => r.find(text).map(|m| PatternMatch {
                start: m.start(),
                end: m.end(),
                captures: r.captures(text),
            }),
            Self::Eof => None,
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "Literal({s:?})"),
            Self::Regex(r) => write!(f, "Regex({:?})", r.pattern()),
            Self::Eof => write!(f, "Eof"),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

/// A compiled regular expression with its source pattern.
#[derive(Clone)]
pub struct CompiledRegex {
    pattern: String,
    regex: Regex,
}

impl CompiledRegex {
    /// Create a new compiled regex.
    #[must_use]
    pub const fn new(pattern: String, regex: Regex) -> Self {
        Self { pattern, regex }
    }

    /// Get the source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Find the first match in the text.
    #[must_use]
    pub fn find<'a>(&self, text: &'a str) -> Option<regex::Match<'a>> {
        self.regex.find(text)
    }

    /// Get capture groups from the first match.
    #[must_use]
    pub fn captures(&self, text: &str) -> Vec<String> {
        self.regex
            .captures(text)
            .map(|caps| {
                caps.iter()
                    .skip(1) // Skip the full match
                    .filter_map(|m| m.map(|m| m.as_str().to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Result of a successful pattern match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Start position of the match in the text.
    pub start: usize,
    /// End position of the match in the text.
    pub end: usize,
    /// Capture groups (for regex patterns).
    pub captures: Vec<String>,
}

impl PatternMatch {
    /// Get the matched text from the original input.
    #[must_use]
    pub fn as_str<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }

    /// Get the length of the match.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the match is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_matches() {
        let pattern = Pattern::literal("ok");
        let text = "v4> 1 2 + ok\n";
        let m = pattern.matches(text).unwrap();
        assert_eq!(m.as_str(text), "ok");
        assert_eq!(m.start, 10);
        assert!(pattern.matches("Error: stack underflow").is_none());
    }

    #[test]
    fn literal_is_not_a_regex() {
        let pattern = Pattern::from("Goodbye!");
        assert!(pattern.matches("Goodbye!").is_some());
        assert!(Pattern::literal("a.c").matches("abc").is_none());
    }

    #[test]
    fn regex_pattern_matches() {
        let pattern = Pattern::regex(r"V4 REPL v\d+\.\d+").unwrap();
        let text = "V4 REPL v0.1.0\n";
        let m = pattern.matches(text).unwrap();
        assert_eq!(m.as_str(text), "V4 REPL v0.1");
    }

    #[test]
    fn regex_pattern_captures() {
        let pattern = Pattern::regex(r"Connected to (\S+)").unwrap();
        let m = pattern.matches("Connected to /dev/ttyACM0\n").unwrap();
        assert_eq!(m.captures, vec!["/dev/ttyACM0"]);
    }

    #[test]
    fn invalid_regex_is_an_error() {
        assert!(Pattern::regex("(unclosed").is_err());
    }

    #[test]
    fn eof_never_matches_text() {
        assert!(Pattern::eof().is_eof());
        assert!(Pattern::eof().matches("<EOF>").is_none());
        assert_eq!(Pattern::eof().as_str(), "<EOF>");
    }
}
