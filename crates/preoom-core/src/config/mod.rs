//! Supervisor configuration
//!
//! Provides library defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Command-line flags (applied by the launcher through the builder)
//! 2. Environment variables
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use preoom_core::Config;
//!
//! let config = Config::from_env()
//!     .command(vec!["java".into(), "-jar".into(), "app.jar".into()])
//!     .threshold_percent(85.0)
//!     .on_preoom_hook(Some("jcmd $PREOOM_PID GC.heap_dump /tmp/heap.hprof".into()));
//! config.validate()?;
//! ```

pub mod defaults;

use std::path::PathBuf;
use std::time::Duration;

use crate::env::{env_get, env_get_str};
use crate::error::{ConfigError, ConfigResult};

/// Immutable supervisor configuration, built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Command to supervise (argv, first element is the program)
    pub command: Vec<String>,
    /// Soft threshold as a percentage of the hard limit, in (0, 100)
    pub threshold_percent: f64,
    /// Shell line run concurrently with the pre-OOM termination
    pub on_preoom_hook: Option<String>,
    /// Shell line run after the primary exits, only if pre-OOM fired
    pub on_stop_hook: Option<String>,
    /// Usage polling cadence
    pub poll_interval: Duration,
    /// Mount point of the cgroup filesystem
    pub cgroup_root: PathBuf,
    /// Shell used for hook lines
    pub shell: PathBuf,
    /// `tracing` filter directive for diagnostics
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Config {
    /// Create config from library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `PREOOM_POLL_INTERVAL_MS` - Polling cadence in milliseconds
    /// - `PREOOM_CGROUP_ROOT` - cgroup filesystem mount point
    /// - `PREOOM_SHELL` - Shell for hook lines
    /// - `PREOOM_LOG_LEVEL` - Log filter (`error`..`trace` or a directive)
    ///
    /// The command, threshold and hooks are never taken from here. The
    /// launcher owns `PREOOM_PERCENT`, `PREOOM_HOOK` and `PREOOM_STOP_HOOK`
    /// as fallbacks for its flags.
    pub fn from_env() -> Self {
        Self {
            command: Vec::new(),
            threshold_percent: defaults::THRESHOLD_PERCENT,
            on_preoom_hook: None,
            on_stop_hook: None,
            poll_interval: Duration::from_millis(env_get(
                "PREOOM_POLL_INTERVAL_MS",
                defaults::POLL_INTERVAL_MS,
            )),
            cgroup_root: PathBuf::from(env_get_str("PREOOM_CGROUP_ROOT", defaults::CGROUP_ROOT)),
            shell: PathBuf::from(env_get_str("PREOOM_SHELL", defaults::SHELL)),
            log_level: env_get_str("PREOOM_LOG_LEVEL", defaults::LOG_LEVEL),
        }
    }

    /// Create config with explicit defaults (no env override).
    /// Useful for testing or when you want full control.
    pub fn new() -> Self {
        Self {
            command: Vec::new(),
            threshold_percent: defaults::THRESHOLD_PERCENT,
            on_preoom_hook: None,
            on_stop_hook: None,
            poll_interval: Duration::from_millis(defaults::POLL_INTERVAL_MS),
            cgroup_root: PathBuf::from(defaults::CGROUP_ROOT),
            shell: PathBuf::from(defaults::SHELL),
            log_level: defaults::LOG_LEVEL.to_string(),
        }
    }

    // Builder methods

    pub fn command(mut self, argv: Vec<String>) -> Self {
        self.command = argv;
        self
    }

    pub fn threshold_percent(mut self, percent: f64) -> Self {
        self.threshold_percent = percent;
        self
    }

    pub fn on_preoom_hook(mut self, hook: Option<String>) -> Self {
        self.on_preoom_hook = hook;
        self
    }

    pub fn on_stop_hook(mut self, hook: Option<String>) -> Self {
        self.on_stop_hook = hook;
        self
    }

    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    pub fn cgroup_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cgroup_root = root.into();
        self
    }

    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Validate configuration and return the first problem found.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.command.is_empty() || self.command[0].is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        check_percent(self.threshold_percent)?;
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if matches!(&self.on_preoom_hook, Some(h) if h.trim().is_empty()) {
            return Err(ConfigError::EmptyHook("pre-oom"));
        }
        if matches!(&self.on_stop_hook, Some(h) if h.trim().is_empty()) {
            return Err(ConfigError::EmptyHook("stop"));
        }
        Ok(())
    }
}

/// Parse a threshold percentage such as `90`, `87.5` or `90%`.
///
/// Used by the launcher's argument parser so range errors surface as
/// usage errors.
pub fn parse_percent(raw: &str) -> ConfigResult<f64> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed);
    let percent: f64 = number
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidPercent(raw.to_string()))?;
    check_percent(percent)?;
    Ok(percent)
}

fn check_percent(percent: f64) -> ConfigResult<()> {
    if !percent.is_finite() || percent <= 0.0 || percent >= 100.0 {
        return Err(ConfigError::PercentOutOfRange(percent));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.threshold_percent, 90.0);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.cgroup_root, PathBuf::from("/sys/fs/cgroup"));
        assert_eq!(config.shell, PathBuf::from("/bin/sh"));
        assert!(config.on_preoom_hook.is_none());
        assert!(config.on_stop_hook.is_none());
    }

    #[test]
    fn test_builder() {
        let config = Config::new()
            .command(argv(&["sleep", "1"]))
            .threshold_percent(75.0)
            .on_stop_hook(Some("echo done".into()))
            .poll_interval(Duration::from_millis(50))
            .cgroup_root("/tmp/cg");

        assert_eq!(config.command, argv(&["sleep", "1"]));
        assert_eq!(config.threshold_percent, 75.0);
        assert_eq!(config.on_stop_hook.as_deref(), Some("echo done"));
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.cgroup_root, PathBuf::from("/tmp/cg"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert_eq!(Config::new().validate(), Err(ConfigError::EmptyCommand));

        let ok = Config::new().command(argv(&["true"]));
        assert!(ok.validate().is_ok());

        for bad in [0.0, 100.0, -5.0, 250.0, f64::NAN] {
            let config = ok.clone().threshold_percent(bad);
            assert!(matches!(config.validate(), Err(ConfigError::PercentOutOfRange(_))));
        }

        let config = ok.clone().poll_interval(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroPollInterval));

        let config = ok.clone().on_preoom_hook(Some("   ".into()));
        assert_eq!(config.validate(), Err(ConfigError::EmptyHook("pre-oom")));
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("90"), Ok(90.0));
        assert_eq!(parse_percent("87.5"), Ok(87.5));
        assert_eq!(parse_percent(" 80% "), Ok(80.0));
        assert_eq!(parse_percent("100"), Err(ConfigError::PercentOutOfRange(100.0)));
        assert_eq!(parse_percent("0"), Err(ConfigError::PercentOutOfRange(0.0)));
        assert_eq!(parse_percent("lots"), Err(ConfigError::InvalidPercent("lots".into())));
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("PREOOM_POLL_INTERVAL_MS", "250");
        std::env::set_var("PREOOM_CGROUP_ROOT", "/tmp/fake-cgroup");
        let config = Config::from_env();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.cgroup_root, PathBuf::from("/tmp/fake-cgroup"));
        std::env::remove_var("PREOOM_POLL_INTERVAL_MS");
        std::env::remove_var("PREOOM_CGROUP_ROOT");
    }

    #[test]
    fn test_from_env_leaves_flag_fields_alone() {
        std::env::set_var("PREOOM_PERCENT", "42%");
        let config = Config::from_env();
        assert_eq!(config.threshold_percent, defaults::THRESHOLD_PERCENT);
        assert!(config.on_preoom_hook.is_none());
        std::env::remove_var("PREOOM_PERCENT");
    }
}
