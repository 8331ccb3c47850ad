//! Supervisor loop
//!
//! One thread drives everything:
//!
//! 1. Wait for a blocked signal or the next poll deadline, whichever is first
//! 2. Relay a terminal signal to the primary (SIGCHLD only wakes us)
//! 3. Reap every child that has exited, without blocking
//! 4. On a due tick, sample usage and fire the pre-OOM action once
//!
//! When the primary is reaped the loop drains outstanding hooks, runs the
//! stop hook if pre-OOM fired, and returns the primary's exit code.
//!
//! ```text
//! Running --breach--> Breached --primary reaped--> Draining --> Done
//!    |                                               ^
//!    +------------------primary reaped---------------+
//! ```

use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use preoom_core::{Config, ExitOutcome, MemoryLimits, ProcessRole};
use tracing::{debug, info, trace, warn};

use crate::cgroup::{Supervised, UsageSource};
use crate::error::Result;
use crate::process::{ProcessTable, Reaped};
use crate::signal::{is_relayed, SignalMask};

/// Supervisor phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Primary alive, no breach yet
    Running,
    /// Pre-OOM fired, primary asked to terminate
    Breached,
    /// Primary exited, finishing hooks
    Draining,
    /// Exit code final
    Done,
}

/// Mutable state owned by the loop.
#[derive(Debug)]
pub struct SupervisionState {
    pub primary_pid: Pid,
    /// Pre-OOM hook, until reaped
    pub hook_pid: Option<Pid>,
    /// Set at most once
    pub preoom_fired: bool,
    /// Captured once, never overwritten
    pub primary_exit: Option<ExitOutcome>,
    pub phase: Phase,
}

impl SupervisionState {
    fn new(primary_pid: Pid) -> Self {
        Self {
            primary_pid,
            hook_pid: None,
            preoom_fired: false,
            primary_exit: None,
            phase: Phase::Running,
        }
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "phase");
            self.phase = phase;
        }
    }
}

/// Supervises one primary command inside a memory-limited cgroup.
pub struct Supervisor<'a> {
    config: &'a Config,
    limits: MemoryLimits,
    usage: UsageSource,
    procs: ProcessTable,
    state: SupervisionState,
    // Last field: the mask is restored only after children are reaped.
    signals: SignalMask,
}

impl<'a> Supervisor<'a> {
    /// Block supervised signals on this thread and start the primary.
    pub fn start(config: &'a Config, supervised: Supervised) -> Result<Self> {
        let signals = SignalMask::block_supervised()?;
        let mut procs = ProcessTable::new(signals.previous(), &config.shell);
        let primary_pid = procs.spawn_primary(&config.command)?;
        info!(
            pid = primary_pid.as_raw(),
            limit = supervised.limits.hard_limit_bytes,
            threshold = supervised.limits.soft_threshold_bytes,
            "supervising"
        );
        Ok(Self {
            config,
            limits: supervised.limits,
            usage: supervised.usage,
            procs,
            state: SupervisionState::new(primary_pid),
            signals,
        })
    }

    pub fn state(&self) -> &SupervisionState {
        &self.state
    }

    /// Run until the primary exits; returns its normalized exit code.
    pub fn run(&mut self) -> Result<i32> {
        let outcome = self.supervise()?;
        self.drain(outcome)?;
        self.state.enter(Phase::Done);
        Ok(outcome.code())
    }

    fn supervise(&mut self) -> Result<ExitOutcome> {
        let interval = self.config.poll_interval;
        let mut next_tick = Instant::now() + interval;

        loop {
            let timeout = next_tick.saturating_duration_since(Instant::now());
            if let Some(signal) = self.signals.wait_timeout(timeout)? {
                self.on_signal(signal);
            }

            self.reap_available()?;
            if let Some(outcome) = self.state.primary_exit {
                return Ok(outcome);
            }

            let now = Instant::now();
            if now >= next_tick {
                self.on_tick()?;
                next_tick = next_deadline(next_tick, now, interval);
            }
        }
    }

    fn on_signal(&mut self, signal: Signal) {
        if !is_relayed(signal) {
            // SIGCHLD only wakes the loop
            debug!(%signal, "not relayed");
            return;
        }
        info!(pid = self.state.primary_pid.as_raw(), %signal, "forwarding signal");
        self.signal_primary(signal);
    }

    fn on_tick(&mut self) -> Result<()> {
        if self.state.preoom_fired {
            return Ok(());
        }
        let sample = self.usage.read()?;
        trace!(usage = sample, threshold = self.limits.soft_threshold_bytes, "sample");
        if self.limits.is_breached_by(sample) {
            self.fire_preoom(sample)?;
        }
        Ok(())
    }

    fn fire_preoom(&mut self, sample: i64) -> Result<()> {
        self.state.preoom_fired = true;
        self.state.enter(Phase::Breached);
        warn!(
            pid = self.state.primary_pid.as_raw(),
            usage = sample,
            threshold = self.limits.soft_threshold_bytes,
            limit = self.limits.hard_limit_bytes,
            "pre-oom threshold crossed, terminating"
        );

        let config = self.config;
        let hook = match config.on_preoom_hook.as_deref() {
            Some(line) => {
                let env = self.hook_env(Some(sample), None);
                Some(self.procs.spawn_shell(line, ProcessRole::PreoomHook, &env))
            }
            None => None,
        };
        self.signal_primary(Signal::SIGTERM);
        self.state.hook_pid = hook.transpose()?;
        Ok(())
    }

    fn signal_primary(&self, signal: Signal) {
        let pid = self.state.primary_pid;
        if let Err(errno) = kill(pid, signal) {
            warn!(pid = pid.as_raw(), %signal, %errno, "failed to signal primary");
        }
    }

    fn reap_available(&mut self) -> Result<()> {
        while let Some(reaped) = self.procs.reap_nonblocking()? {
            self.on_reaped(reaped);
        }
        Ok(())
    }

    fn on_reaped(&mut self, reaped: Reaped) {
        let pid = reaped.pid.as_raw();
        match reaped.role {
            Some(ProcessRole::Primary) => {
                if self.state.primary_exit.is_none() {
                    info!(pid, code = reaped.outcome.code(), "primary {}", reaped.outcome);
                    self.state.primary_exit = Some(reaped.outcome);
                    self.state.enter(Phase::Draining);
                }
            }
            Some(role) => {
                if self.state.hook_pid == Some(reaped.pid) {
                    self.state.hook_pid = None;
                }
                if reaped.outcome.success() {
                    debug!(pid, %role, "finished");
                } else {
                    warn!(pid, %role, "{}", reaped.outcome);
                }
            }
            None => debug!(pid, "reaped untracked process"),
        }
    }

    fn drain(&mut self, primary: ExitOutcome) -> Result<()> {
        for reaped in self.procs.wait_all()? {
            self.on_reaped(reaped);
        }

        if !self.state.preoom_fired {
            return Ok(());
        }
        let config = self.config;
        let Some(line) = config.on_stop_hook.as_deref() else {
            return Ok(());
        };

        let env = self.hook_env(None, Some(primary.code()));
        let pid = self.procs.spawn_shell(line, ProcessRole::StopHook, &env)?;
        info!(pid = pid.as_raw(), "running stop hook");
        let reaped = self.procs.wait_for(pid)?;
        info!(pid = pid.as_raw(), code = reaped.outcome.code(), "stop hook finished");
        self.on_reaped(reaped);
        Ok(())
    }

    fn hook_env(&self, usage: Option<i64>, exit_code: Option<i32>) -> Vec<(&'static str, String)> {
        let mut env = vec![
            ("PREOOM_PID", self.state.primary_pid.as_raw().to_string()),
            ("PREOOM_LIMIT_BYTES", self.limits.hard_limit_bytes.to_string()),
            ("PREOOM_THRESHOLD_BYTES", self.limits.soft_threshold_bytes.to_string()),
        ];
        if let Some(usage) = usage {
            env.push(("PREOOM_USAGE_BYTES", usage.to_string()));
        }
        if let Some(code) = exit_code {
            env.push(("PREOOM_EXIT_CODE", code.to_string()));
        }
        env
    }
}

/// Advance a fixed-cadence deadline, skipping ticks that were missed
/// entirely instead of firing them in a burst.
fn next_deadline(previous: Instant, now: Instant, interval: Duration) -> Instant {
    let next = previous + interval;
    if next <= now {
        now + interval
    } else {
        next
    }
}
