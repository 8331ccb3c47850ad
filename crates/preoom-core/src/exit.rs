//! Exit outcomes and exit code normalization

use core::fmt;

/// Offset added to a terminating signal number (shell convention)
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Normal exit with the given status code
    Exited(i32),
    /// Killed by the given signal number
    Signaled(i32),
}

impl ExitOutcome {
    /// Normalize to a single exit code.
    ///
    /// Normal exits keep their code; signal deaths map to `128 + signo`.
    #[inline]
    pub const fn code(&self) -> i32 {
        match *self {
            ExitOutcome::Exited(code) => code,
            ExitOutcome::Signaled(signo) => SIGNAL_EXIT_BASE + signo,
        }
    }

    #[inline]
    pub const fn success(&self) -> bool {
        matches!(self, ExitOutcome::Exited(0))
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Exited(code) => write!(f, "exited with status {}", code),
            ExitOutcome::Signaled(signo) => write!(f, "killed by signal {}", signo),
        }
    }
}
