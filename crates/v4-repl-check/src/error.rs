//! Error types for v4-repl-check.
//!
//! Every failure of a run ends up as an [`ExpectError`]. Errors that happen
//! while waiting for output carry the buffered text seen so far, so the
//! failure report can show what the REPL actually printed.

use std::time::Duration;

use thiserror::Error;

use crate::types::ProcessExitStatus;

/// Maximum length of buffer content to display in error messages.
const MAX_BUFFER_DISPLAY: usize = 500;

/// Context lines to show before/after truncation point.
const CONTEXT_LINES: usize = 3;

/// Format buffer content for display, truncating if necessary.
fn format_buffer_snippet(buffer: &str) -> String {
    if buffer.is_empty() {
        return "(empty buffer)".to_string();
    }

    let buffer_len = buffer.len();
    let lines: Vec<&str> = buffer.lines().collect();
    let total_lines = lines.len();

    if buffer_len <= MAX_BUFFER_DISPLAY || total_lines <= CONTEXT_LINES * 2 {
        return format!(
            "┌─ buffer ({buffer_len} bytes) ──────────────────────\n│ {}\n└────────────────────────────────────────",
            lines.join("\n│ ")
        );
    }

    // Large buffer: the tail is what precedes the failure
    let tail_lines = &lines[total_lines.saturating_sub(CONTEXT_LINES * 2)..];
    let hidden = total_lines - tail_lines.len();

    format!(
        "┌─ buffer ({buffer_len} bytes, {total_lines} lines) ─────────────\n│ ... ({hidden} lines hidden)\n│ {}\n└────────────────────────────────────────",
        tail_lines.join("\n│ ")
    )
}

fn format_timeout_error(duration: Duration, pattern: &str, buffer: &str) -> String {
    let buffer_snippet = format_buffer_snippet(buffer);

    format!(
        "timeout after {duration:?} waiting for pattern\n\
         \n\
         Pattern: '{pattern}'\n\
         \n\
         {buffer_snippet}"
    )
}

fn format_termination_error(
    pattern: &str,
    exit_status: Option<&ProcessExitStatus>,
    buffer: &str,
) -> String {
    let buffer_snippet = format_buffer_snippet(buffer);
    let status =
        exit_status.map_or_else(|| "exit status unknown".to_string(), ToString::to_string);

    format!(
        "process output closed before pattern was seen ({status})\n\
         \n\
         Pattern: '{pattern}'\n\
         \n\
         {buffer_snippet}"
    )
}

/// Coarse classification of a failure, as reported at the top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The child program could not be launched.
    Spawn,
    /// An expected pattern did not appear before its deadline.
    Timeout,
    /// The child closed its output before all expectations were met.
    UnexpectedTermination,
    /// Anything else (I/O, configuration, bad regex, closed session).
    Uncategorized,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Spawn => "SpawnError",
            Self::Timeout => "TimeoutError",
            Self::UnexpectedTermination => "UnexpectedTermination",
            Self::Uncategorized => "UncategorizedError",
        };
        f.write_str(s)
    }
}

/// The main error type for v4-repl-check operations.
#[derive(Debug, Error)]
pub enum ExpectError {
    /// Failed to spawn the REPL process.
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] SpawnError),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Timeout waiting for pattern match.
    #[error("{}", format_timeout_error(*duration, pattern, buffer))]
    Timeout {
        /// The timeout duration that elapsed.
        duration: Duration,
        /// The pattern that was being searched for.
        pattern: String,
        /// Buffer contents at the time of timeout.
        buffer: String,
    },

    /// The process closed its output before the pattern appeared.
    #[error("{}", format_termination_error(pattern, exit_status.as_ref(), buffer))]
    UnexpectedTermination {
        /// The pattern that was being searched for.
        pattern: String,
        /// Exit status, if the process could be reaped at that point.
        exit_status: Option<ProcessExitStatus>,
        /// Buffer contents when the stream closed.
        buffer: String,
    },

    /// Invalid regex pattern.
    #[error("invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Session is closed.
    #[error("session is closed")]
    SessionClosed,

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// A script step failed.
    #[error("step {index} ({name}) failed: {source}")]
    StepFailed {
        /// 0-based position of the step in its script.
        index: usize,
        /// Human-readable step name.
        name: String,
        /// What went wrong.
        #[source]
        source: Box<ExpectError>,
    },
}

/// Errors related to process spawning.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// Command not found.
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The command that was not found.
        command: String,
    },

    /// Permission denied.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// The path that could not be executed.
        path: String,
    },

    /// The child was started without one of its piped streams.
    #[error("child process has no {stream} handle")]
    MissingStream {
        /// Which stream (`stdin`, `stdout`, `stderr`).
        stream: &'static str,
    },

    /// General I/O error during spawn.
    #[error("I/O error during spawn: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for v4-repl-check operations.
pub type Result<T> = std::result::Result<T, ExpectError>;

impl ExpectError {
    /// Create a timeout error with the given details.
    pub fn timeout(
        duration: Duration,
        pattern: impl Into<String>,
        buffer: impl Into<String>,
    ) -> Self {
        Self::Timeout {
            duration,
            pattern: pattern.into(),
            buffer: buffer.into(),
        }
    }

    /// Create an unexpected termination error.
    pub fn unexpected_termination(
        pattern: impl Into<String>,
        exit_status: Option<ProcessExitStatus>,
        buffer: impl Into<String>,
    ) -> Self {
        Self::UnexpectedTermination {
            pattern: pattern.into(),
            exit_status,
            buffer: buffer.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Wrap this error as the failure of a script step.
    pub fn in_step(self, index: usize, name: impl Into<String>) -> Self {
        Self::StepFailed {
            index,
            name: name.into(),
            source: Box::new(self),
        }
    }

    /// Classify the error. A failed step reports the kind of its cause.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Spawn(_) => ErrorKind::Spawn,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::UnexpectedTermination { .. } => ErrorKind::UnexpectedTermination,
            Self::StepFailed { source, .. } => source.kind(),
            _ => ErrorKind::Uncategorized,
        }
    }

    /// Check if this is (or wraps) a timeout error.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// Check if this is (or wraps) an unexpected termination.
    #[must_use]
    pub fn is_unexpected_termination(&self) -> bool {
        self.kind() == ErrorKind::UnexpectedTermination
    }

    /// Get the buffer contents if this error contains them.
    #[must_use]
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Self::Timeout { buffer, .. } | Self::UnexpectedTermination { buffer, .. } => {
                Some(buffer)
            }
            Self::StepFailed { source, .. } => source.buffer(),
            _ => None,
        }
    }

    /// Name of the failed step, if this error came out of a script.
    #[must_use]
    pub fn step_name(&self) -> Option<&str> {
        match self {
            Self::StepFailed { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl SpawnError {
    /// Create a command not found error.
    pub fn command_not_found(command: impl Into<String>) -> Self {
        Self::CommandNotFound {
            command: command.into(),
        }
    }

    /// Create a permission denied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied { path: path.into() }
    }

    /// Map an I/O error from `Command::spawn` onto a spawn error for `command`.
    #[must_use]
    pub fn from_io(command: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::command_not_found(command),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(command),
            _ => Self::Io(err),
        }
    }
}
