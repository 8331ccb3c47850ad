//! Process roles

use core::fmt;

/// What a spawned process is for.
///
/// Assigned at spawn time so a reaped pid maps back to its meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessRole {
    /// The supervised command
    Primary,
    /// Diagnostic hook started alongside the pre-OOM termination
    PreoomHook,
    /// Cleanup hook run after the primary exits
    StopHook,
}

impl ProcessRole {
    /// Check if this is the supervised command
    #[inline]
    pub const fn is_primary(&self) -> bool {
        matches!(self, ProcessRole::Primary)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ProcessRole::Primary => "primary",
            ProcessRole::PreoomHook => "pre-oom hook",
            ProcessRole::StopHook => "stop hook",
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
