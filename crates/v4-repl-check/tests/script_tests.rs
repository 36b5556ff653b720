//! Integration tests for the script runner and the V4 smoke test.

#![cfg(unix)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use v4_repl_check::{
    DriverConfig, ErrorKind, ExpectError, Match, ProcessExitStatus, Reporter, Script,
    ScriptReport, ScriptRunner, ShutdownConfig, SilentReporter, Step, repl_smoke_test,
};

const SIM: &str = env!("CARGO_BIN_EXE_v4-repl-sim");
const PORT: &str = "/dev/ttyTEST0";

fn sim_config() -> DriverConfig {
    DriverConfig::new(SIM)
        .echo_output(false)
        .timeout(Duration::from_secs(5))
        .shutdown(
            ShutdownConfig::default()
                .with_graceful_timeout(Duration::from_millis(300))
                .with_terminate_timeout(Duration::from_millis(300)),
        )
}

async fn run(config: DriverConfig) -> v4_repl_check::Result<ScriptReport> {
    ScriptRunner::new(config)
        .with_reporter(SilentReporter)
        .run(&repl_smoke_test(), PORT)
        .await
}

/// Reporter that records events into a shared log.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Reporter for Recorder {
    fn script_started(&mut self, script: &Script, target: &str) {
        self.push(format!("start {} {target}", script.name));
    }

    fn step_started(&mut self, index: usize, _step: &Step) {
        self.push(format!("step {index}"));
    }

    fn step_passed(&mut self, index: usize, _step: &Step, _last: Option<&Match>) {
        self.push(format!("pass {index}"));
    }

    fn step_failed(&mut self, index: usize, _step: &Step, error: &ExpectError) {
        self.push(format!("fail {index} {}", error.kind()));
    }

    fn script_finished(&mut self, report: &ScriptReport) {
        self.push(format!("finish {}", report.passed.len()));
    }
}

#[tokio::test]
async fn compliant_repl_passes() {
    let report = run(sim_config()).await.unwrap();

    assert_eq!(report.script, "v4-repl");
    assert_eq!(report.passed.len(), repl_smoke_test().len());
    assert_eq!(report.exit_status, Some(ProcessExitStatus::Exited(0)));
}

#[tokio::test]
async fn slow_acknowledgement_times_out_at_that_step() {
    let config = sim_config()
        .timeout(Duration::from_millis(500))
        .env("V4_SIM_DELAY_MS", "2000");

    let start = Instant::now();
    let err = run(config).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.step_name(), Some("Simple arithmetic: 1 2 +"));
    assert!(err.buffer().is_some_and(|b| b.contains("v4> ")));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn early_exit_is_unexpected_termination() {
    let config = sim_config().env("V4_SIM_CRASH_ON", "5 sq");
    let err = run(config).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnexpectedTermination);
    match err {
        ExpectError::StepFailed { index, name, .. } => {
            assert_eq!(index, 3);
            assert_eq!(name, "Use defined word: 5 sq");
        }
        other => panic!("expected step failure, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_reply_to_ping_fails_the_run() {
    let config = sim_config()
        .timeout(Duration::from_millis(500))
        .env("V4_SIM_MUTE_ON", ".ping");
    let err = run(config).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.step_name(), Some("Meta command: .ping"));
}

#[tokio::test]
async fn missing_banner_fails_startup() {
    let config = sim_config()
        .timeout(Duration::from_millis(500))
        .env("V4_SIM_NO_BANNER", "1");
    let err = run(config).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.step_name(), Some("REPL start-up"));
}

#[tokio::test]
async fn repl_that_never_exits_is_still_torn_down() {
    let config = sim_config()
        .timeout(Duration::from_millis(500))
        .env("V4_SIM_MUTE_ON", "bye")
        .env("V4_SIM_STUCK", "1")
        .env("V4_SIM_IGNORE_TERM", "1");

    let start = Instant::now();
    let err = run(config).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.step_name(), Some("Exit REPL"));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn two_runs_give_the_same_result() {
    let first = run(sim_config()).await.unwrap();
    let second = run(sim_config()).await.unwrap();
    assert_eq!(first, second);

    let failing = || sim_config().env("V4_SIM_CRASH_ON", ".ping");
    let first = run(failing()).await.unwrap_err();
    let second = run(failing()).await.unwrap_err();
    assert_eq!(first.kind(), second.kind());
    assert_eq!(first.step_name(), second.step_name());
}

#[tokio::test]
async fn reporter_sees_every_step() {
    let recorder = Recorder::default();
    let report = ScriptRunner::new(sim_config())
        .with_reporter(recorder.clone())
        .run(&repl_smoke_test(), PORT)
        .await
        .unwrap();

    let events = recorder.events();
    assert_eq!(events.first().map(String::as_str), Some("start v4-repl /dev/ttyTEST0"));
    assert_eq!(
        events.last().map(String::as_str),
        Some(format!("finish {}", report.passed.len()).as_str())
    );
    assert_eq!(events.iter().filter(|e| e.starts_with("pass")).count(), 8);
}

#[tokio::test]
async fn reporter_sees_the_failure() {
    let recorder = Recorder::default();
    let config = sim_config().env("V4_SIM_CRASH_ON", "1 2 +");
    let err = ScriptRunner::new(config)
        .with_reporter(recorder.clone())
        .run(&repl_smoke_test(), PORT)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnexpectedTermination);
    assert_eq!(
        recorder.events(),
        [
            "start v4-repl /dev/ttyTEST0",
            "step 0",
            "pass 0",
            "step 1",
            "fail 1 UnexpectedTermination",
        ]
    );
}

#[tokio::test]
async fn custom_script_with_regex() {
    let script = Script::named("custom")
        .step(Step::new("banner").expect(v4_repl_check::Pattern::regex(r"v\d+\.\d+\.\d+").unwrap()))
        .send_expect("help", ".help", "Available commands:")
        .send_expect("unknown", ".frob", "Unknown command: .frob")
        .step(Step::new("exit").send("quit").expect("Goodbye!").expect_exit());

    let report = ScriptRunner::new(sim_config())
        .with_reporter(SilentReporter)
        .run(&script, PORT)
        .await
        .unwrap();

    assert_eq!(report.passed, ["banner", "help", "unknown", "exit"]);
}
