//! Session handle for interacting with the spawned REPL.
//!
//! This module provides the `Session` type that the script runner uses to
//! control the child process, send input lines, and expect output.

use std::io::Write as _;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, trace, warn};

use super::lifecycle::{ShutdownConfig, Signal};
use crate::config::{DriverConfig, LineEnding};
use crate::error::{ExpectError, Result, SpawnError};
use crate::expect::{ExpectState, Matcher, Pattern};
use crate::types::{Match, ProcessExitStatus, SessionState};

/// How long to keep draining stderr once stdout has closed.
const STDERR_DRAIN: Duration = Duration::from_millis(50);

/// How long to wait for the exit status once the output has closed.
const REAP_GRACE: Duration = Duration::from_millis(200);

/// Which pipe a chunk came from.
#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// A session handle for one spawned REPL process.
///
/// Stdout and stderr both feed the same output buffer. The child is killed
/// if the session is dropped without [`Session::close`].
pub struct Session {
    /// The child process.
    child: Child,
    /// Input pipe; `None` once closed.
    stdin: Option<ChildStdin>,
    /// Output pipe; `None` once it reached EOF.
    stdout: Option<ChildStdout>,
    /// Error pipe; `None` once it reached EOF.
    stderr: Option<ChildStderr>,
    /// Pattern matcher over the accumulated output.
    matcher: Matcher,
    /// Default expect timeout.
    timeout: Duration,
    /// Terminator appended by `send_line`.
    line_ending: LineEnding,
    /// Teardown behaviour.
    shutdown: ShutdownConfig,
    /// Mirror output to our stdout.
    echo: bool,
    /// Current session state.
    state: SessionState,
    /// Child pid, captured at spawn.
    pid: Option<u32>,
    /// Command line, for logs.
    command: String,
    /// Exit status once collected.
    exit_status: Option<ProcessExitStatus>,
}

impl Session {
    /// Spawn `<binary> <subcommand...> <port-flag> <target>`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Spawn`] if the executable cannot be started.
    pub fn spawn(config: &DriverConfig, target: &str) -> Result<Self> {
        let command = config.command_line(target);
        debug!(%command, "spawning REPL");

        let mut child = Command::new(&config.binary)
            .args(config.args_for(target))
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpawnError::from_io(&config.binary.display().to_string(), e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or(SpawnError::MissingStream { stream: "stdin" })?;
        let stdout = child
            .stdout
            .take()
            .ok_or(SpawnError::MissingStream { stream: "stdout" })?;
        let stderr = child
            .stderr
            .take()
            .ok_or(SpawnError::MissingStream { stream: "stderr" })?;

        let pid = child.id();
        debug!(?pid, "REPL started");

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: Some(stdout),
            stderr: Some(stderr),
            matcher: Matcher::new(config.buffer.max_size),
            timeout: config.timeout,
            line_ending: config.line_ending,
            shutdown: config.shutdown,
            echo: config.echo_output,
            state: SessionState::Running,
            pid,
            command,
            exit_status: None,
        })
    }

    /// Get the current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Get the child process ID.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// The command line this session was spawned with.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Default timeout for [`Session::expect`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check if the child closed its output.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.stdout.is_none()
    }

    /// Exit status, once it has been collected.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ProcessExitStatus> {
        self.exit_status
    }

    /// Get the current (unmatched) buffer contents.
    #[must_use]
    pub fn buffer(&mut self) -> String {
        self.matcher.buffer_str()
    }

    /// Send bytes to the process.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::SessionClosed`] after `close`, and
    /// [`ExpectError::UnexpectedTermination`] if the child is gone.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ExpectError::SessionClosed);
        };

        let written = async {
            stdin.write_all(data).await?;
            stdin.flush().await
        }
        .await;

        match written {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                let pattern = format!("<send {:?}>", String::from_utf8_lossy(data));
                let status = self.collect_exit_status(REAP_GRACE).await;
                Err(ExpectError::unexpected_termination(
                    pattern,
                    status,
                    self.matcher.buffer_str(),
                ))
            }
            Err(e) => Err(ExpectError::io_context("writing to process", e)),
        }
    }

    /// Send a line to the process (appends the configured line ending).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        debug!(line, "sending");
        let data = format!("{line}{}", self.line_ending.as_str());
        self.send(data.as_bytes()).await
    }

    /// Expect a pattern in the output, with the session's default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Timeout`] when the deadline passes and
    /// [`ExpectError::UnexpectedTermination`] when the output closes first.
    pub async fn expect(&mut self, pattern: impl Into<Pattern>) -> Result<Match> {
        self.expect_timeout(pattern, self.timeout).await
    }

    /// Expect a pattern with a specific timeout.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, EOF, or I/O error.
    pub async fn expect_timeout(
        &mut self,
        pattern: impl Into<Pattern>,
        timeout: Duration,
    ) -> Result<Match> {
        if matches!(self.state, SessionState::Closed) {
            return Err(ExpectError::SessionClosed);
        }

        let state = ExpectState::new(pattern.into(), timeout);
        debug!(pattern = %state.pattern(), ?timeout, "expecting");

        loop {
            if let Some(result) = self.matcher.try_match(state.pattern()) {
                let m = self.matcher.consume_match(&result);
                debug!(matched = %m.matched, "pattern matched");
                return Ok(m);
            }

            if self.is_eof() {
                let status = self.collect_exit_status(REAP_GRACE).await;
                if state.expects_eof() {
                    debug!(?status, "output closed as expected");
                    return Ok(self.matcher.consume_all());
                }
                return Err(ExpectError::unexpected_termination(
                    state.pattern().as_str(),
                    status,
                    self.matcher.buffer_str(),
                ));
            }

            if state.is_timed_out() {
                return Err(ExpectError::timeout(
                    state.timeout(),
                    state.pattern().as_str(),
                    self.matcher.buffer_str(),
                ));
            }

            self.read_with_timeout(state.remaining_time()).await?;
        }
    }

    /// Expect the child to close its output.
    ///
    /// # Errors
    ///
    /// Returns an error if the output is still open when `timeout` passes.
    pub async fn expect_eof_timeout(&mut self, timeout: Duration) -> Result<Match> {
        self.expect_timeout(Pattern::eof(), timeout).await
    }

    /// Read whatever arrives on stdout or stderr within `timeout`.
    ///
    /// Returns the number of bytes appended; 0 on timeout or EOF.
    async fn read_with_timeout(&mut self, timeout: Duration) -> Result<usize> {
        let mut out = [0u8; 4096];
        let mut err = [0u8; 4096];

        let outcome = {
            let Some(stdout) = self.stdout.as_mut() else {
                return Ok(0);
            };
            let stderr = self.stderr.as_mut();
            let read = async {
                match stderr {
                    Some(stderr) => tokio::select! {
                        r = stdout.read(&mut out) => (Stream::Stdout, r),
                        r = stderr.read(&mut err) => (Stream::Stderr, r),
                    },
                    None => (Stream::Stdout, stdout.read(&mut out).await),
                }
            };
            tokio::time::timeout(timeout, read).await
        };

        match outcome {
            // Timeout, but not an error - caller will handle
            Err(_) => Ok(0),
            Ok((Stream::Stdout, Ok(0))) => {
                trace!("stdout closed");
                self.stdout = None;
                self.drain_stderr().await;
                Ok(0)
            }
            Ok((Stream::Stderr, Ok(0))) => {
                trace!("stderr closed");
                self.stderr = None;
                Ok(0)
            }
            Ok((Stream::Stdout, Ok(n))) => {
                self.take_output(&out[..n]);
                Ok(n)
            }
            Ok((Stream::Stderr, Ok(n))) => {
                self.take_output(&err[..n]);
                Ok(n)
            }
            Ok((_, Err(e))) => Err(ExpectError::io_context("reading from process", e)),
        }
    }

    /// Pick up error text the child wrote just before exiting.
    async fn drain_stderr(&mut self) {
        let mut buf = [0u8; 4096];
        while let Some(stderr) = self.stderr.as_mut() {
            match tokio::time::timeout(STDERR_DRAIN, stderr.read(&mut buf)).await {
                Ok(Ok(n)) if n > 0 => self.take_output(&buf[..n]),
                Ok(_) => self.stderr = None,
                Err(_) => break,
            }
        }
    }

    fn take_output(&mut self, data: &[u8]) {
        trace!(bytes = data.len(), "received");
        self.matcher.append(data);
        if self.echo {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = stdout.write_all(data).and_then(|()| stdout.flush()) {
                debug!(error = %e, "failed to echo child output");
            }
        }
    }

    /// Wait up to `timeout` for the child to exit, recording its status.
    async fn collect_exit_status(&mut self, timeout: Duration) -> Option<ProcessExitStatus> {
        if let Some(status) = self.exit_status {
            return Some(status);
        }
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                let status = ProcessExitStatus::from(status);
                self.exit_status = Some(status);
                if !matches!(self.state, SessionState::Closing) {
                    self.state = SessionState::Exited(status);
                }
                Some(status)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "failed to wait for REPL");
                None
            }
            Err(_) => None,
        }
    }

    /// Send a signal to the child process.
    ///
    /// # Errors
    ///
    /// Returns an error if sending the signal fails.
    #[cfg(unix)]
    pub fn signal(&self, signal: Signal) -> Result<()> {
        let Some(pid) = self.pid else {
            return Err(ExpectError::SessionClosed);
        };
        if self.exit_status.is_some() {
            return Ok(());
        }
        let pid = libc::pid_t::try_from(pid)
            .map_err(|_| ExpectError::config(format!("pid {pid} out of range")))?;
        #[allow(unsafe_code)]
        // SAFETY: pid came from a child we spawned and have not reaped yet
        // (exit_status is None), so it cannot have been recycled.
        let result = unsafe { libc::kill(pid, signal.as_signal_number()) };
        if result == 0 {
            Ok(())
        } else {
            Err(ExpectError::io_context(
                format!("sending {signal:?} to pid {pid}"),
                std::io::Error::last_os_error(),
            ))
        }
    }

    /// Terminate the child and release its pipes.
    ///
    /// Follows the configured [`ShutdownConfig`]: close stdin and wait, then
    /// SIGTERM and wait, then SIGKILL. Safe to call more than once; later
    /// calls return the status collected by the first.
    ///
    /// # Errors
    ///
    /// Returns an error if the child cannot be killed or reaped.
    pub async fn close(&mut self) -> Result<ProcessExitStatus> {
        if matches!(self.state, SessionState::Closed) {
            return Ok(self.exit_status.unwrap_or(ProcessExitStatus::Unknown));
        }
        self.state = SessionState::Closing;
        debug!(pid = ?self.pid, "closing session");

        drop(self.stdin.take());

        let mut status = self.exit_status;

        if status.is_none() && self.shutdown.waits_for_graceful_exit() {
            status = self
                .collect_exit_status(self.shutdown.graceful_timeout)
                .await;
        }

        #[cfg(unix)]
        if status.is_none() && self.shutdown.sends_terminate() {
            debug!(pid = ?self.pid, "REPL still running, sending SIGTERM");
            if let Err(e) = self.signal(Signal::Terminate) {
                warn!(error = %e, "SIGTERM failed");
            }
            status = self
                .collect_exit_status(self.shutdown.terminate_timeout)
                .await;
        }

        let status = match status {
            Some(status) => status,
            None => {
                warn!(pid = ?self.pid, "REPL unresponsive, killing");
                self.child
                    .kill()
                    .await
                    .map_err(|e| ExpectError::io_context("killing process", e))?;
                let status = self
                    .child
                    .wait()
                    .await
                    .map_err(|e| ExpectError::io_context("reaping process", e))?;
                ProcessExitStatus::from(status)
            }
        };

        self.stdout = None;
        self.stderr = None;
        self.exit_status = Some(status);
        self.state = SessionState::Closed;
        debug!(%status, "session closed");
        Ok(status)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.exit_status.is_none() {
            warn!(pid = ?self.pid, "session dropped without close, killing REPL");
            if let Err(e) = self.child.start_kill() {
                debug!(error = %e, "start_kill failed");
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("command", &self.command)
            .field("pid", &self.pid)
            .field("state", &self.state)
            .field("eof", &self.is_eof())
            .finish_non_exhaustive()
    }
}
