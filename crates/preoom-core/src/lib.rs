//! # preoom-core
//!
//! Core types for the pre-OOM supervisor.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Cgroup access, signals and process control live in `preoom-runtime`.
//!
//! ## Modules
//!
//! - `config` - Supervisor configuration (defaults, env overrides, validation)
//! - `threshold` - Soft-threshold computation and breach test
//! - `role` - Process roles used to tag spawned children
//! - `exit` - Exit outcome and shell-style exit code normalization
//! - `error` - Error types
//! - `env` - Environment variable utilities

pub mod config;
pub mod threshold;
pub mod role;
pub mod exit;
pub mod error;
pub mod env;

// Re-exports for convenience
pub use config::Config;
pub use threshold::{compute_threshold, is_over, MemoryLimits};
pub use role::ProcessRole;
pub use exit::ExitOutcome;
pub use error::{ConfigError, ConfigResult};
pub use env::{env_get, env_get_opt, env_get_str};
