//! v4-repl-check: scripted smoke test for the V4 Forth REPL.
//!
//! The crate spawns `v4 repl --port <address>`, writes lines to it and waits
//! for expected output, expect-style. Every expectation has a deadline; the
//! first one that is not met fails the run, and the child is always torn down.
//!
//! # Example
//!
//! ```ignore
//! use v4_repl_check::{DriverConfig, ScriptRunner, repl_smoke_test};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> v4_repl_check::Result<()> {
//!     let config = DriverConfig::new("./target/release/v4");
//!     let report = ScriptRunner::new(config)
//!         .run(&repl_smoke_test(), "/dev/ttyACM0")
//!         .await?;
//!     println!("{} steps passed", report.passed.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod expect;
pub mod logging;
pub mod script;
pub mod session;
pub mod types;

pub use config::{BufferConfig, DriverConfig, LineEnding};
pub use error::{ErrorKind, ExpectError, Result, SpawnError};
pub use expect::{Matcher, OutputBuffer, Pattern};
pub use script::{
    ConsoleReporter, Reporter, Script, ScriptReport, ScriptRunner, SilentReporter, Step,
    repl_smoke_test,
};
pub use session::{Session, ShutdownConfig, ShutdownStrategy, Signal};
pub use types::{Match, ProcessExitStatus, SessionState};
