//! Environment-based configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::{DriverConfig, LineEnding};
use crate::error::{ExpectError, Result};

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "V4_REPL_CHECK";

/// Environment variable reader.
///
/// Reads `<PREFIX>_<NAME>` from the process environment, or from a fixed
/// map when built with [`EnvConfig::from_vars`].
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
    /// Fixed variables used instead of the process environment.
    vars: Option<HashMap<String, String>>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Create a new environment config reader.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            vars: None,
        }
    }

    /// Create a reader over a fixed set of variables instead of the process
    /// environment.
    #[must_use]
    pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            vars: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let var_name = self.var_name(name);
        match &self.vars {
            Some(vars) => vars.get(&var_name).cloned(),
            None => std::env::var(&var_name).ok(),
        }
    }

    /// Get a boolean value.
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| {
            matches!(
                v.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on" | "enabled"
            )
        })
    }

    /// Get a duration given in (possibly fractional) seconds.
    pub fn duration_secs(&self, name: &str) -> Result<Option<Duration>> {
        self.get(name)
            .map(|v| {
                v.trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                    .filter(|timeout| !timeout.is_zero())
                    .ok_or_else(|| {
                        ExpectError::config(format!(
                            "{} must be a positive number of seconds, got '{v}'",
                            self.var_name(name)
                        ))
                    })
            })
            .transpose()
    }

    /// Overlay the recognised variables onto `config`.
    ///
    /// `BINARY`, `TIMEOUT` (seconds), `ECHO` (bool) and `LINE_ENDING`.
    pub fn apply(&self, config: &mut DriverConfig) -> Result<()> {
        if let Some(binary) = self.get("binary") {
            config.binary = PathBuf::from(binary);
        }
        if let Some(timeout) = self.duration_secs("timeout")? {
            config.timeout = timeout;
        }
        if let Some(echo) = self.bool("echo") {
            config.echo_output = echo;
        }
        if let Some(ending) = self.get("line_ending") {
            config.line_ending = ending
                .parse::<LineEnding>()
                .map_err(ExpectError::config)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> EnvConfig {
        EnvConfig::from_vars(DEFAULT_PREFIX, vars.iter().copied())
    }

    #[test]
    fn var_name_uses_prefix() {
        let env = env(&[("V4_REPL_CHECK_BINARY", "/opt/v4")]);
        assert_eq!(env.get("binary").as_deref(), Some("/opt/v4"));
        assert_eq!(env.get("timeout"), None);
    }

    #[test]
    fn bool_values() {
        let env = env(&[("V4_REPL_CHECK_ECHO", "off"), ("V4_REPL_CHECK_X", "Yes")]);
        assert_eq!(env.bool("echo"), Some(false));
        assert_eq!(env.bool("x"), Some(true));
        assert_eq!(env.bool("missing"), None);
    }

    #[test]
    fn apply_overrides_config() {
        let env = env(&[
            ("V4_REPL_CHECK_BINARY", "/opt/v4/bin/v4"),
            ("V4_REPL_CHECK_TIMEOUT", "2.5"),
            ("V4_REPL_CHECK_ECHO", "0"),
            ("V4_REPL_CHECK_LINE_ENDING", "cr"),
        ]);
        let mut config = DriverConfig::default();
        env.apply(&mut config).unwrap();

        assert_eq!(config.binary, PathBuf::from("/opt/v4/bin/v4"));
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert!(!config.echo_output);
        assert_eq!(config.line_ending, LineEnding::Cr);
    }

    #[test]
    fn apply_rejects_bad_timeout() {
        let env = env(&[("V4_REPL_CHECK_TIMEOUT", "soon")]);
        let mut config = DriverConfig::default();
        let err = env.apply(&mut config).unwrap_err();
        assert!(err.to_string().contains("V4_REPL_CHECK_TIMEOUT"));
        assert_eq!(config.timeout, super::super::DEFAULT_TIMEOUT);
    }

    #[test]
    fn apply_rejects_zero_timeout() {
        for value in ["0", "0.0", "-2"] {
            let env = env(&[("V4_REPL_CHECK_TIMEOUT", value)]);
            let mut config = DriverConfig::default();
            let err = env.apply(&mut config).unwrap_err();
            assert!(err.to_string().contains("positive"), "{value}");
            assert_eq!(config.timeout, super::super::DEFAULT_TIMEOUT);
        }
    }

    #[test]
    fn empty_environment_changes_nothing() {
        let env = env(&[]);
        let mut config = DriverConfig::default();
        env.apply(&mut config).unwrap();
        assert_eq!(config.binary, DriverConfig::default().binary);
    }
}
