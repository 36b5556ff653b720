//! Common types for v4-repl-check.
//!
//! Match results, session state and process exit status.

use std::fmt;

/// A match result from an expect operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// The full text that matched.
    pub matched: String,

    /// Capture groups from regex patterns.
    pub captures: Vec<String>,

    /// Text before the match.
    pub before: String,

    /// Text after the match (remaining in buffer).
    pub after: String,
}

impl Match {
    /// Create a new match result.
    #[must_use]
    pub fn new(
        matched: impl Into<String>,
        before: impl Into<String>,
        after: impl Into<String>,
    ) -> Self {
        Self {
            matched: matched.into(),
            captures: Vec::new(),
            before: before.into(),
            after: after.into(),
        }
    }

    /// Create a match with captures.
    #[must_use]
    pub fn with_captures(mut self, captures: Vec<String>) -> Self {
        self.captures = captures;
        self
    }

    /// Get a capture group by index.
    #[must_use]
    pub fn capture(&self, index: usize) -> Option<&str> {
        self.captures.get(index).map(String::as_str)
    }

    /// Get the full matched text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.matched
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.matched)
    }
}

/// The state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session is running and ready for operations.
    Running,

    /// Session is being torn down.
    Closing,

    /// Session was closed by the driver.
    Closed,

    /// Process has exited on its own with status.
    Exited(ProcessExitStatus),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
            Self::Exited(status) => write!(f, "exited ({status})"),
        }
    }
}

/// Exit status of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExitStatus {
    /// Process exited with a code.
    Exited(i32),

    /// Process was terminated by a signal (Unix).
    Signaled(i32),

    /// Exit status is unknown.
    Unknown,
}

impl ProcessExitStatus {
    /// Check if the process exited successfully (code 0).
    #[must_use]
    pub const fn success(self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Get the exit code if the process exited normally.
    #[must_use]
    pub const fn code(self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(code),
            _ => None,
        }
    }

    /// Get the signal number if the process was signaled.
    #[must_use]
    pub const fn signal(self) -> Option<i32> {
        match self {
            Self::Signaled(sig) => Some(sig),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signaled(sig) => write!(f, "terminated by signal {sig}"),
            Self::Unknown => write!(f, "unknown exit status"),
        }
    }
}

impl From<std::process::ExitStatus> for ProcessExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(code) = status.code() {
                Self::Exited(code)
            } else if let Some(sig) = status.signal() {
                Self::Signaled(sig)
            } else {
                Self::Unknown
            }
        }

        #[cfg(not(unix))]
        {
            status.code().map_or(Self::Unknown, Self::Exited)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_accessors() {
        let m = Match::new("ok", "v4> 1 2 + ", "\n").with_captures(vec!["3".into()]);
        assert_eq!(m.as_str(), "ok");
        assert_eq!(m.capture(0), Some("3"));
        assert_eq!(m.capture(1), None);
        assert_eq!(m.to_string(), "ok");
    }

    #[test]
    fn session_state_display() {
        assert_eq!(SessionState::Running.to_string(), "running");
        assert_eq!(SessionState::Closed.to_string(), "closed");
        let exited = SessionState::Exited(ProcessExitStatus::Exited(0));
        assert_eq!(exited.to_string(), "exited (exited with code 0)");
    }

    #[test]
    fn exit_status_helpers() {
        assert!(ProcessExitStatus::Exited(0).success());
        assert!(!ProcessExitStatus::Exited(1).success());
        assert_eq!(ProcessExitStatus::Signaled(9).signal(), Some(9));
        assert_eq!(ProcessExitStatus::Signaled(9).code(), None);
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_from_std() {
        use std::os::unix::process::ExitStatusExt;

        let exited = std::process::ExitStatus::from_raw(3 << 8);
        assert_eq!(ProcessExitStatus::from(exited), ProcessExitStatus::Exited(3));

        let killed = std::process::ExitStatus::from_raw(9);
        assert_eq!(ProcessExitStatus::from(killed), ProcessExitStatus::Signaled(9));
    }
}
