//! Script execution engine.

use std::io::Write as _;

use tracing::{debug, info, warn};

use super::definition::{Script, Step};
use crate::config::DriverConfig;
use crate::error::{ErrorKind, ExpectError, Result};
use crate::session::Session;
use crate::types::{Match, ProcessExitStatus};

/// Result of a fully passed script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptReport {
    /// Name of the script.
    pub script: String,
    /// Names of the steps that passed, in order.
    pub passed: Vec<String>,
    /// Exit status of the REPL, collected on close.
    pub exit_status: Option<ProcessExitStatus>,
}

/// Receives progress events while a script runs.
pub trait Reporter {
    /// The script is about to spawn the REPL.
    fn script_started(&mut self, script: &Script, target: &str);
    /// A step is about to run.
    fn step_started(&mut self, index: usize, step: &Step);
    /// A step matched all of its expectations.
    fn step_passed(&mut self, index: usize, step: &Step, last: Option<&Match>);
    /// A step failed; the run stops here.
    fn step_failed(&mut self, index: usize, step: &Step, error: &ExpectError);
    /// Every step passed.
    fn script_finished(&mut self, report: &ScriptReport);
}

/// Reporter that prints nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn script_started(&mut self, _script: &Script, _target: &str) {}
    fn step_started(&mut self, _index: usize, _step: &Step) {}
    fn step_passed(&mut self, _index: usize, _step: &Step, _last: Option<&Match>) {}
    fn step_failed(&mut self, _index: usize, _step: &Step, _error: &ExpectError) {}
    fn script_finished(&mut self, _report: &ScriptReport) {}
}

/// Human-readable progress on stdout.
///
/// Steps that send a line are announced as `[TEST n]`, where `n` is the
/// step's position in the script.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    fn emit(text: &str) {
        let mut stdout = std::io::stdout().lock();
        // Progress lines are best effort; a closed stdout must not fail the run.
        let _ = writeln!(stdout, "{text}").and_then(|()| stdout.flush());
    }
}

impl Reporter for ConsoleReporter {
    fn script_started(&mut self, _script: &Script, target: &str) {
        Self::emit(&format!("Testing V4 REPL on {target}..."));
    }

    fn step_started(&mut self, index: usize, step: &Step) {
        if step.send.is_some() {
            Self::emit(&format!("\n[TEST {index}] {}", step.name));
        }
    }

    fn step_passed(&mut self, _index: usize, step: &Step, _last: Option<&Match>) {
        Self::emit(&format!("✓ {}", step.passed_message()));
    }

    fn step_failed(&mut self, index: usize, step: &Step, error: &ExpectError) {
        let reason = match error.kind() {
            ErrorKind::Timeout => "Timeout waiting for response".to_string(),
            ErrorKind::UnexpectedTermination => "Unexpected EOF".to_string(),
            _ => error.to_string(),
        };
        Self::emit(&format!(
            "\n❌ Test failed at step {index} ({}): {reason}",
            step.name
        ));
        if let Some(buffer) = error.buffer() {
            Self::emit(&format!("Buffer: {buffer:?}"));
        }
    }

    fn script_finished(&mut self, _report: &ScriptReport) {
        Self::emit("\n✅ All tests passed!");
    }
}

/// Runs a [`Script`] against a freshly spawned REPL.
pub struct ScriptRunner {
    config: DriverConfig,
    reporter: Box<dyn Reporter + Send>,
}

impl ScriptRunner {
    /// Create a runner that reports to stdout.
    #[must_use]
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            reporter: Box::new(ConsoleReporter),
        }
    }

    /// Replace the reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: impl Reporter + Send + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// The configuration sessions are spawned with.
    #[must_use]
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Spawn the REPL for `target`, run every step, and close the session.
    ///
    /// The session is closed on every path, including a failed step. A step
    /// failure is returned as [`ExpectError::StepFailed`].
    ///
    /// # Errors
    ///
    /// Returns the spawn error, the first step failure, or a close failure.
    pub async fn run(&mut self, script: &Script, target: &str) -> Result<ScriptReport> {
        info!(script = %script.name, target, steps = script.len(), "starting script");
        self.reporter.script_started(script, target);

        let mut session = Session::spawn(&self.config, target)?;
        let outcome = self.run_steps(&mut session, script).await;
        let closed = session.close().await;

        match (outcome, closed) {
            (Ok(passed), Ok(status)) => {
                let report = ScriptReport {
                    script: script.name.clone(),
                    passed,
                    exit_status: Some(status),
                };
                info!(%status, "script passed");
                self.reporter.script_finished(&report);
                Ok(report)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "failed to close session after step failure");
                }
                Err(e)
            }
        }
    }

    async fn run_steps(&mut self, session: &mut Session, script: &Script) -> Result<Vec<String>> {
        let mut passed = Vec::with_capacity(script.len());

        for (index, step) in script.steps().iter().enumerate() {
            self.reporter.step_started(index, step);
            match Self::run_step(session, step).await {
                Ok(last) => {
                    debug!(index, step = %step.name, "step passed");
                    self.reporter.step_passed(index, step, last.as_ref());
                    passed.push(step.name.clone());
                }
                Err(e) => {
                    warn!(index, step = %step.name, kind = %e.kind(), "step failed");
                    self.reporter.step_failed(index, step, &e);
                    return Err(e.in_step(index, step.name.clone()));
                }
            }
        }

        Ok(passed)
    }

    async fn run_step(session: &mut Session, step: &Step) -> Result<Option<Match>> {
        let timeout = step.timeout.unwrap_or_else(|| session.timeout());

        if let Some(line) = step.send_text() {
            session.send_line(line).await?;
        }

        let mut last = None;
        for pattern in &step.expect {
            last = Some(session.expect_timeout(pattern.clone(), timeout).await?);
        }

        if step.expect_exit {
            session.expect_eof_timeout(timeout).await?;
        }

        Ok(last)
    }
}

impl std::fmt::Debug for ScriptRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Default)]
    struct Recording {
        events: Vec<String>,
    }

    impl Reporter for Recording {
        fn script_started(&mut self, script: &Script, target: &str) {
            self.events.push(format!("start {} {target}", script.name));
        }
        fn step_started(&mut self, index: usize, _step: &Step) {
            self.events.push(format!("step {index}"));
        }
        fn step_passed(&mut self, index: usize, _step: &Step, _last: Option<&Match>) {
            self.events.push(format!("pass {index}"));
        }
        fn step_failed(&mut self, index: usize, _step: &Step, error: &ExpectError) {
            self.events.push(format!("fail {index} {}", error.kind()));
        }
        fn script_finished(&mut self, _report: &ScriptReport) {
            self.events.push("finish".to_string());
        }
    }

    #[test]
    fn silent_reporter_accepts_events() {
        let mut reporter = SilentReporter;
        let step = Step::new("x");
        reporter.step_started(0, &step);
        reporter.step_failed(0, &step, &ExpectError::SessionClosed);
    }

    #[test]
    fn recording_reporter_sees_failures_with_kind() {
        let mut reporter = Recording::default();
        let step = Step::new("add");
        let err = ExpectError::timeout(Duration::from_secs(1), "ok", "");
        reporter.step_failed(1, &step, &err);
        assert_eq!(reporter.events, ["fail 1 TimeoutError"]);
    }

    #[tokio::test]
    async fn spawn_failure_is_not_a_step_failure() {
        let config = DriverConfig::new("/nonexistent/v4-repl-check-test-binary").echo_output(false);
        let script = Script::named("smoke").send_expect("add", "1 2 +", "ok");
        let mut runner = ScriptRunner::new(config).with_reporter(SilentReporter);

        let err = runner.run(&script, "/dev/null").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Spawn);
        assert!(err.step_name().is_none());
    }

    #[tokio::test]
    async fn shell_child_runs_a_small_script() {
        let config = DriverConfig::new("/bin/sh")
            .subcommand(["-c", "echo 'V4 REPL'; read line; echo \" ok\"; read line; echo Goodbye!"])
            .echo_output(false);
        let script = Script::named("shell")
            .step(Step::new("banner").expect("V4 REPL"))
            .send_expect("add", "1 2 +", "ok")
            .step(Step::new("exit").send("bye").expect("Goodbye!").expect_exit());

        let mut runner = ScriptRunner::new(config).with_reporter(SilentReporter);
        let report = runner.run(&script, "/dev/null").await.unwrap();

        assert_eq!(report.passed, ["banner", "add", "exit"]);
        assert_eq!(report.exit_status, Some(ProcessExitStatus::Exited(0)));
    }
}
