//! Configuration types for v4-repl-check.
//!
//! [`DriverConfig`] says which program to launch, how long to wait for each
//! expectation and how to tear the child down. It is assembled in layers:
//! built-in defaults, then an optional TOML file ([`file`]), then
//! `V4_REPL_CHECK_*` environment variables ([`env`]); the CLI applies its own
//! flags last.

pub mod env;
pub mod file;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;
use crate::session::ShutdownConfig;

/// Default REPL binary, relative to the V4 checkout.
pub const DEFAULT_BINARY: &str = "./target/release/v4";

/// Default timeout for each expectation (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default output buffer size (1 MB).
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Configuration for a driver run.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// The REPL executable.
    pub binary: PathBuf,

    /// Arguments placed before the port flag (`repl` for the V4 CLI).
    pub subcommand: Vec<String>,

    /// Flag that introduces the target address.
    pub port_flag: String,

    /// Extra environment variables for the child.
    pub env: HashMap<String, String>,

    /// Default timeout for expect operations.
    pub timeout: Duration,

    /// Shutdown behaviour for `close`.
    pub shutdown: ShutdownConfig,

    /// Buffer configuration.
    pub buffer: BufferConfig,

    /// Line terminator appended by `send_line`.
    pub line_ending: LineEnding,

    /// Mirror everything the child prints to stdout.
    pub echo_output: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY),
            subcommand: vec!["repl".to_string()],
            port_flag: "--port".to_string(),
            env: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
            shutdown: ShutdownConfig::default(),
            buffer: BufferConfig::default(),
            line_ending: LineEnding::default(),
            echo_output: true,
        }
    }
}

impl DriverConfig {
    /// Create a configuration for the given REPL binary.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ..Default::default()
        }
    }

    /// Load defaults, then `path` (if any), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            file::FileConfig::load(path)?.apply(&mut config)?;
        }
        env::EnvConfig::default().apply(&mut config)?;
        Ok(config)
    }

    /// Set the arguments placed before the port flag.
    #[must_use]
    pub fn subcommand<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subcommand = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the default expect timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the shutdown behaviour.
    #[must_use]
    pub const fn shutdown(mut self, shutdown: ShutdownConfig) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Set the line ending style.
    #[must_use]
    pub const fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Enable or disable mirroring of child output.
    #[must_use]
    pub const fn echo_output(mut self, echo: bool) -> Self {
        self.echo_output = echo;
        self
    }

    /// Full argument list for a session against `target`.
    #[must_use]
    pub fn args_for(&self, target: &str) -> Vec<String> {
        let mut args = self.subcommand.clone();
        args.push(self.port_flag.clone());
        args.push(target.to_string());
        args
    }

    /// Render the command line for logs and reports.
    #[must_use]
    pub fn command_line(&self, target: &str) -> String {
        let mut line = self.binary.display().to_string();
        for arg in self.args_for(target) {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }
}

/// Configuration for the output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// Maximum number of bytes kept; older output is discarded first.
    pub max_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl BufferConfig {
    /// Create a buffer configuration with the given maximum size.
    #[must_use]
    pub const fn new(max_size: usize) -> Self {
        Self { max_size }
    }
}

/// Line ending style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Unix-style line feed (`\n`).
    #[default]
    Lf,
    /// Windows-style carriage return + line feed (`\r\n`).
    CrLf,
    /// Carriage return only (`\r`), as typed on a serial terminal.
    Cr,
}

impl LineEnding {
    /// Get the line ending as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
        }
    }
}

impl std::str::FromStr for LineEnding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lf" => Ok(Self::Lf),
            "crlf" => Ok(Self::CrLf),
            "cr" => Ok(Self::Cr),
            other => Err(format!("unknown line ending '{other}' (expected lf, crlf or cr)")),
        }
    }
}
