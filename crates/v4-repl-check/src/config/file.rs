//! File-based configuration loading.
//!
//! ```toml
//! binary = "/opt/v4/bin/v4"
//! timeout_secs = 5
//! echo_output = false
//! line_ending = "crlf"
//!
//! [shutdown]
//! strategy = "escalating"
//! graceful_ms = 500
//! terminate_ms = 2000
//!
//! [env]
//! RUST_LOG = "debug"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::{DriverConfig, LineEnding};
use crate::error::{ExpectError, Result};
use crate::session::ShutdownStrategy;

/// Contents of a TOML configuration file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// REPL executable.
    pub binary: Option<PathBuf>,
    /// Arguments placed before the port flag.
    pub subcommand: Option<Vec<String>>,
    /// Flag introducing the target address.
    pub port_flag: Option<String>,
    /// Expect timeout in seconds.
    pub timeout_secs: Option<f64>,
    /// Mirror child output to stdout.
    pub echo_output: Option<bool>,
    /// Line terminator for sent lines.
    pub line_ending: Option<LineEnding>,
    /// Output buffer cap in bytes.
    pub buffer_max_size: Option<usize>,
    /// Shutdown timings.
    #[serde(default)]
    pub shutdown: ShutdownSection,
    /// Extra environment for the child.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// `[shutdown]` table.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShutdownSection {
    /// `escalating`, `terminate` or `kill`.
    pub strategy: Option<ShutdownStrategy>,
    /// How long to wait after closing stdin before signalling.
    pub graceful_ms: Option<u64>,
    /// How long to wait after SIGTERM before SIGKILL.
    pub terminate_ms: Option<u64>,
}

impl FileConfig {
    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExpectError::io_context(format!("reading config file {}", path.display()), e)
        })?;
        Self::from_toml_str(&text)
            .map_err(|e| ExpectError::config(format!("{}: {e}", path.display())))
    }

    /// Parse TOML text.
    pub fn from_toml_str(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Overlay the keys present in the file onto `config`.
    pub fn apply(self, config: &mut DriverConfig) -> Result<()> {
        if let Some(binary) = self.binary {
            config.binary = binary;
        }
        if let Some(subcommand) = self.subcommand {
            config.subcommand = subcommand;
        }
        if let Some(flag) = self.port_flag {
            config.port_flag = flag;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::try_from_secs_f64(secs)
                .ok()
                .filter(|timeout| !timeout.is_zero())
                .ok_or_else(|| {
                    ExpectError::config(format!("timeout_secs must be positive, got {secs}"))
                })?;
        }
        if let Some(echo) = self.echo_output {
            config.echo_output = echo;
        }
        if let Some(ending) = self.line_ending {
            config.line_ending = ending;
        }
        if let Some(max_size) = self.buffer_max_size {
            if max_size == 0 {
                return Err(ExpectError::config("buffer_max_size must be greater than zero"));
            }
            config.buffer.max_size = max_size;
        }
        if let Some(strategy) = self.shutdown.strategy {
            config.shutdown.strategy = strategy;
        }
        if let Some(ms) = self.shutdown.graceful_ms {
            config.shutdown.graceful_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.shutdown.terminate_ms {
            config.shutdown.terminate_timeout = Duration::from_millis(ms);
        }
        config.env.extend(self.env);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_file() {
        let file = FileConfig::from_toml_str(
            r#"
            binary = "/opt/v4/bin/v4"
            timeout_secs = 2.5
            echo_output = false
            line_ending = "crlf"
            buffer_max_size = 4096

            [shutdown]
            strategy = "terminate"
            graceful_ms = 100
            terminate_ms = 200

            [env]
            V4_LOG = "trace"
            "#,
        )
        .unwrap();

        let mut config = DriverConfig::default();
        file.apply(&mut config).unwrap();

        assert_eq!(config.binary, PathBuf::from("/opt/v4/bin/v4"));
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert!(!config.echo_output);
        assert_eq!(config.line_ending, LineEnding::CrLf);
        assert_eq!(config.buffer.max_size, 4096);
        assert_eq!(config.shutdown.strategy, ShutdownStrategy::Terminate);
        assert_eq!(config.shutdown.graceful_timeout, Duration::from_millis(100));
        assert_eq!(config.shutdown.terminate_timeout, Duration::from_millis(200));
        assert_eq!(config.env.get("V4_LOG").map(String::as_str), Some("trace"));
    }

    #[test]
    fn empty_file_keeps_defaults() {
        let file = FileConfig::from_toml_str("").unwrap();
        let mut config = DriverConfig::default();
        file.apply(&mut config).unwrap();
        assert_eq!(config.timeout, DriverConfig::default().timeout);
        assert_eq!(config.subcommand, vec!["repl"]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FileConfig::from_toml_str("retries = 3").is_err());
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let file = FileConfig::from_toml_str("buffer_max_size = 0").unwrap();
        let mut config = DriverConfig::default();
        assert!(file.apply(&mut config).is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        for text in ["timeout_secs = 0", "timeout_secs = 0.0", "timeout_secs = -1.5"] {
            let file = FileConfig::from_toml_str(text).unwrap();
            let mut config = DriverConfig::default();
            let err = file.apply(&mut config).unwrap_err();
            assert!(err.to_string().contains("timeout_secs"), "{text}");
        }
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(FileConfig::from_toml_str("[shutdown]\nstrategy = \"polite\"").is_err());
    }

    #[test]
    fn load_missing_file_reports_path() {
        let err = FileConfig::load(Path::new("/nonexistent/v4-repl-check.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/v4-repl-check.toml"));
    }

    #[test]
    fn load_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "v4-repl-check-config-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "timeout_secs = 1\n").unwrap();

        let loaded = FileConfig::load(&path);
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded.unwrap().timeout_secs, Some(1.0));
    }
}
