//! Session lifecycle management.
//!
//! How a session tears its child down on `close`.

use std::time::Duration;

use serde::Deserialize;

/// Shutdown strategy for closing a session.
///
/// Selected in a config file with `[shutdown] strategy = "terminate"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownStrategy {
    /// Close stdin and wait, then SIGTERM and wait, then SIGKILL.
    #[default]
    Escalating,
    /// SIGTERM and wait, then SIGKILL.
    Terminate,
    /// SIGKILL immediately.
    Kill,
}

/// Configuration for session shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownConfig {
    /// The shutdown strategy to use.
    pub strategy: ShutdownStrategy,
    /// How long to wait for the child to exit after its stdin is closed.
    pub graceful_timeout: Duration,
    /// How long to wait after SIGTERM before SIGKILL.
    pub terminate_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            strategy: ShutdownStrategy::Escalating,
            graceful_timeout: Duration::from_secs(1),
            terminate_timeout: Duration::from_secs(2),
        }
    }
}

impl ShutdownConfig {
    /// Create a new shutdown config with kill strategy.
    #[must_use]
    pub fn kill() -> Self {
        Self {
            strategy: ShutdownStrategy::Kill,
            ..Default::default()
        }
    }

    /// Set the graceful timeout.
    #[must_use]
    pub const fn with_graceful_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_timeout = timeout;
        self
    }

    /// Set the terminate timeout.
    #[must_use]
    pub const fn with_terminate_timeout(mut self, timeout: Duration) -> Self {
        self.terminate_timeout = timeout;
        self
    }

    /// Whether `close` starts by closing stdin and waiting.
    #[must_use]
    pub const fn waits_for_graceful_exit(&self) -> bool {
        matches!(self.strategy, ShutdownStrategy::Escalating)
    }

    /// Whether `close` sends SIGTERM before SIGKILL.
    #[must_use]
    pub const fn sends_terminate(&self) -> bool {
        matches!(
            self.strategy,
            ShutdownStrategy::Escalating | ShutdownStrategy::Terminate
        )
    }
}

/// Signals that can be sent to a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Terminate.
    Terminate,
    /// Kill (non-catchable).
    Kill,
}

impl Signal {
    /// Get the Unix signal number for this signal.
    #[cfg(unix)]
    #[must_use]
    pub const fn as_signal_number(&self) -> i32 {
        match self {
            Self::Terminate => libc::SIGTERM,
            Self::Kill => libc::SIGKILL,
        }
    }
}
