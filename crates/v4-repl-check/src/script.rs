//! Scripted interaction with the REPL.
//!
//! A [`Script`] is a flat list of [`Step`]s. The [`ScriptRunner`] spawns one
//! session, runs the steps in order, stops at the first failure and closes the
//! session whatever happened.

pub mod definition;
pub mod executor;
pub mod v4;

pub use definition::{Script, Step};
pub use executor::{ConsoleReporter, Reporter, ScriptReport, ScriptRunner, SilentReporter};
pub use v4::repl_smoke_test;
