//! Library defaults, overridden by environment variables and CLI flags.

/// Soft threshold as a percentage of the cgroup hard limit
pub const THRESHOLD_PERCENT: f64 = 90.0;

/// Usage polling cadence in milliseconds
pub const POLL_INTERVAL_MS: u64 = 1000;

/// Mount point of the cgroup filesystem
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Shell used to run hook lines (`<shell> -c <line>`)
pub const SHELL: &str = "/bin/sh";

/// Default `tracing` filter directive
pub const LOG_LEVEL: &str = "info";
