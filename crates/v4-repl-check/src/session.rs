//! Session module for driving a spawned REPL process.
//!
//! A [`Session`] owns the child process and its pipes. It is the only place
//! that blocks: [`Session::expect`] waits for output until a pattern shows up,
//! the child closes its output, or the deadline passes.
//!
//! # Examples
//!
//! ```ignore
//! use v4_repl_check::{DriverConfig, Session};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> v4_repl_check::Result<()> {
//!     let config = DriverConfig::new("./target/release/v4");
//!     let mut session = Session::spawn(&config, "/dev/ttyACM0")?;
//!
//!     session.expect("Device ready").await?;
//!     session.send_line("1 2 +").await?;
//!     session.expect("ok").await?;
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

mod handle;
mod lifecycle;

pub use handle::Session;
pub use lifecycle::{ShutdownConfig, ShutdownStrategy, Signal};
