//! # preoom-runtime
//!
//! Linux runtime for the pre-OOM supervisor.
//!
//! This crate provides:
//! - Cgroup v1/v2 memory limit discovery and usage polling
//! - Signal masking and synchronous signal collection
//! - Child process table (spawn, role tagging, reaping)
//! - The supervisor loop that ties them together
//!
//! [`run`] is the single entry point used by the launcher.

pub mod error;
pub mod cgroup;
pub mod signal;
pub mod process;
pub mod supervisor;
pub mod logging;

// Re-exports
pub use error::{Error, Result};
pub use cgroup::{CgroupReader, CgroupVersion, Fallback, Supervised, UsageSource};
pub use supervisor::{Phase, SupervisionState, Supervisor};
pub use logging::init_logging;

cfg_if::cfg_if! {
    if #[cfg(not(target_os = "linux"))] {
        compile_error!("preoom-runtime only supports Linux");
    }
}

use preoom_core::Config;
use tracing::{debug, warn};

/// Run `config.command` under supervision and return its exit code.
///
/// Without a usable memory limit the command replaces this process
/// instead, so on that path the function only returns if exec failed.
pub fn run(config: &Config) -> Result<i32> {
    config.validate()?;

    let reader = CgroupReader::new(&config.cgroup_root);
    match reader.discover(config.threshold_percent) {
        Ok(supervised) => {
            debug!(
                version = ?supervised.version,
                usage = %supervised.usage.path().display(),
                limit = supervised.limits.hard_limit_bytes,
                threshold = supervised.limits.soft_threshold_bytes,
                "cgroup discovered"
            );
            let mut supervisor = Supervisor::start(config, supervised)?;
            supervisor.run()
        }
        Err(fallback) => {
            warn!("{fallback}, just exec...");
            Err(process::exec_direct(&config.command))
        }
    }
}
