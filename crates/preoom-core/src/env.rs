//! Environment variable utilities
//!
//! Small typed readers used by the configuration layer.
//!
//! # Usage
//!
//! ```ignore
//! use preoom_core::env::{env_get, env_get_opt};
//!
//! let interval_ms: u64 = env_get("PREOOM_POLL_INTERVAL_MS", 1000);
//! let shell: Option<String> = env_get_opt("PREOOM_SHELL");
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
///
/// Unset and unparsable values both fall back to `default`.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as optional value
///
/// Returns `Some(T)` if the variable is set and parses successfully,
/// `None` otherwise.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
