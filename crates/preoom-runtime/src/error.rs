//! Runtime error types.
//!
//! Everything here is fatal to supervision. Problems found while
//! discovering the cgroup are not errors; see [`Fallback`](crate::cgroup::Fallback).

use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use preoom_core::{ConfigError, ProcessRole};
use thiserror::Error;

/// Exit status when the supervisor itself fails
pub const EXIT_SUPERVISOR_FAILURE: i32 = 125;
/// Exit status when the command exists but could not be executed
pub const EXIT_CANNOT_EXECUTE: i32 = 126;
/// Exit status when the command was not found
pub const EXIT_NOT_FOUND: i32 = 127;

#[derive(Debug, Error)]
pub enum Error {
    /// Configuration rejected before anything ran
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// fork/exec of a child failed
    #[error("failed to spawn {role} `{program}`: {source}")]
    Spawn {
        role: ProcessRole,
        program: String,
        #[source]
        source: io::Error,
    },

    /// Replacing the supervisor image with the command failed
    #[error("failed to exec `{program}`: {source}")]
    Exec {
        program: String,
        #[source]
        source: io::Error,
    },

    /// sigprocmask/pthread_sigmask failed
    #[error("failed to change signal mask: {0}")]
    SignalMask(Errno),

    /// sigtimedwait failed for a reason other than timeout/interrupt
    #[error("failed waiting for signals: {0}")]
    SignalWait(Errno),

    /// waitpid failed for a reason other than "no children"
    #[error("waitpid failed: {0}")]
    Wait(Errno),

    /// Usage counter became unreadable after supervision started
    #[error("failed to read memory usage from {}: {source}", path.display())]
    UsageRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Usage counter no longer holds an integer
    #[error("unparsable memory usage {raw:?} in {}", path.display())]
    UsageParse { path: PathBuf, raw: String },
}

impl Error {
    /// Process exit status to report for this error.
    ///
    /// A primary that cannot be started reports the same status whether or
    /// not it was supervised.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Exec { source, .. } => exec_failure_code(source),
            Error::Spawn { role, source, .. } if role.is_primary() => match source.kind() {
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                    exec_failure_code(source)
                }
                _ => EXIT_SUPERVISOR_FAILURE,
            },
            _ => EXIT_SUPERVISOR_FAILURE,
        }
    }
}

fn exec_failure_code(source: &io::Error) -> i32 {
    if source.kind() == io::ErrorKind::NotFound {
        EXIT_NOT_FOUND
    } else {
        EXIT_CANNOT_EXECUTE
    }
}

pub type Result<T> = std::result::Result<T, Error>;
