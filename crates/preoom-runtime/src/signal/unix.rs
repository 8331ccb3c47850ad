//! Unix signal mask handling for the supervisor thread
//!
//! The supervisor blocks every signal it cares about and collects them
//! synchronously with `sigtimedwait`, so no async handler ever runs.

use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{SigSet, SigmaskHow, Signal};

use crate::error::{Error, Result};

/// Signals forwarded verbatim to the primary process
pub const RELAY_SIGNALS: [Signal; 7] = [
    Signal::SIGHUP,
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTERM,
    Signal::SIGALRM,
    Signal::SIGUSR1,
    Signal::SIGUSR2,
];

/// Check if `signal` is forwarded to the primary
#[inline]
pub fn is_relayed(signal: Signal) -> bool {
    RELAY_SIGNALS.contains(&signal)
}

/// Blocked signal set on the current thread.
///
/// Restores the previous mask on drop. Children must be handed
/// [`previous`](Self::previous) so they start with default delivery.
#[derive(Debug)]
pub struct SignalMask {
    blocked: SigSet,
    previous: SigSet,
}

impl SignalMask {
    /// Block the relay set plus SIGCHLD on the calling thread.
    pub fn block_supervised() -> Result<Self> {
        let mut blocked = SigSet::empty();
        for signal in RELAY_SIGNALS {
            blocked.add(signal);
        }
        blocked.add(Signal::SIGCHLD);

        let previous = blocked
            .thread_swap_mask(SigmaskHow::SIG_BLOCK)
            .map_err(Error::SignalMask)?;
        Ok(Self { blocked, previous })
    }

    /// Mask in effect before supervision started
    pub fn previous(&self) -> SigSet {
        self.previous
    }

    /// Wait up to `timeout` for one blocked signal.
    ///
    /// Returns `Ok(None)` on timeout or interruption.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Option<Signal>> {
        let ts = libc::timespec {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_nsec: timeout.subsec_nanos() as libc::c_long,
        };
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let set: &libc::sigset_t = self.blocked.as_ref();

        // SAFETY: all three pointers are valid for the duration of the call.
        let ret = unsafe { libc::sigtimedwait(set, &mut info, &ts) };
        if ret < 0 {
            return match Errno::last() {
                Errno::EAGAIN | Errno::EINTR => Ok(None),
                errno => Err(Error::SignalWait(errno)),
            };
        }
        Ok(Signal::try_from(ret).ok())
    }
}

impl Drop for SignalMask {
    fn drop(&mut self) {
        // Signals still pending here get their default disposition.
        let _ = self.previous.thread_set_mask();
    }
}
