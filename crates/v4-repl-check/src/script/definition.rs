//! Script definitions for scripted REPL sessions.

use std::time::Duration;

use crate::expect::Pattern;

/// One step of a script: optionally send a line, then wait for each pattern
/// in order.
#[derive(Debug, Clone, Default)]
pub struct Step {
    /// Human-readable name, used in progress output and failure reports.
    pub name: String,
    /// Line to send before expecting.
    pub send: Option<String>,
    /// Patterns to expect, matched one after another.
    pub expect: Vec<Pattern>,
    /// Timeout for each expectation of this step.
    pub timeout: Option<Duration>,
    /// Require the child to close its output once the patterns matched.
    pub expect_exit: bool,
    /// Message reported when the step passes.
    pub passed_message: Option<String>,
}

impl Step {
    /// Create a new step with a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Chain: set the line to send.
    #[must_use]
    pub fn send(mut self, line: impl Into<String>) -> Self {
        self.send = Some(line.into());
        self
    }

    /// Chain: add a pattern to expect.
    #[must_use]
    pub fn expect(mut self, pattern: impl Into<Pattern>) -> Self {
        self.expect.push(pattern.into());
        self
    }

    /// Set the timeout for this step.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Require the child to exit at the end of this step.
    #[must_use]
    pub const fn expect_exit(mut self) -> Self {
        self.expect_exit = true;
        self
    }

    /// Chain: set the message reported when the step passes.
    #[must_use]
    pub fn on_pass(mut self, message: impl Into<String>) -> Self {
        self.passed_message = Some(message.into());
        self
    }

    /// Get the send text.
    #[must_use]
    pub fn send_text(&self) -> Option<&str> {
        self.send.as_deref()
    }

    /// Message to report on success, falling back to the step name.
    #[must_use]
    pub fn passed_message(&self) -> &str {
        self.passed_message.as_deref().unwrap_or(&self.name)
    }
}

/// An ordered list of steps. No branching: every step runs, in order, until
/// one fails.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Name of the script.
    pub name: String,
    /// Steps in execution order.
    pub steps: Vec<Step>,
}

impl Script {
    /// Create a named, empty script.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Add a step.
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Shorthand for a step that sends `line` and expects `pattern`.
    #[must_use]
    pub fn send_expect(
        self,
        name: impl Into<String>,
        line: impl Into<String>,
        pattern: impl Into<Pattern>,
    ) -> Self {
        self.step(Step::new(name).send(line).expect(pattern))
    }

    /// Get the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the script has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Get the steps.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}
