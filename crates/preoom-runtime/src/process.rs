//! Process lifecycle: spawn, reap, exec.
//!
//! Every spawned child is entered in a pid -> [`ProcessRole`] table at
//! spawn time. Reaping uses `waitpid(-1)`, so the table is what tells a
//! primary exit apart from a hook exit.

use std::collections::HashMap;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;

use nix::errno::Errno;
use nix::sys::signal::SigSet;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use preoom_core::{ExitOutcome, ProcessRole};
use tracing::debug;

use crate::error::{Error, Result};

/// A child that has been reaped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaped {
    pub pid: Pid,
    /// `None` for a process this table never spawned
    pub role: Option<ProcessRole>,
    pub outcome: ExitOutcome,
}

/// Children owned by the supervisor.
#[derive(Debug)]
pub struct ProcessTable {
    children: HashMap<Pid, ProcessRole>,
    child_mask: SigSet,
    shell: PathBuf,
}

impl ProcessTable {
    /// `child_mask` is installed in every child before exec.
    pub fn new(child_mask: SigSet, shell: impl Into<PathBuf>) -> Self {
        Self {
            children: HashMap::new(),
            child_mask,
            shell: shell.into(),
        }
    }

    /// Start the supervised command.
    pub fn spawn_primary(&mut self, command: &[String]) -> Result<Pid> {
        let Some((program, args)) = command.split_first() else {
            return Err(preoom_core::ConfigError::EmptyCommand.into());
        };
        let mut cmd = Command::new(program);
        cmd.args(args);
        self.spawn(cmd, ProcessRole::Primary, program)
    }

    /// Run `line` through `<shell> -c`, with `envs` added to the
    /// inherited environment.
    pub fn spawn_shell(
        &mut self,
        line: &str,
        role: ProcessRole,
        envs: &[(&str, String)],
    ) -> Result<Pid> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(line);
        for (key, value) in envs {
            cmd.env(key, value);
        }
        self.spawn(cmd, role, line)
    }

    fn spawn(&mut self, mut cmd: Command, role: ProcessRole, program: &str) -> Result<Pid> {
        let mask = self.child_mask;
        // SAFETY: only pthread_sigmask runs between fork and exec.
        unsafe {
            cmd.pre_exec(move || mask.thread_set_mask().map_err(io::Error::from));
        }
        let child = cmd.spawn().map_err(|source| Error::Spawn {
            role,
            program: program.to_string(),
            source,
        })?;

        // Dropping `Child` neither waits nor kills; reaping happens below.
        let pid = Pid::from_raw(child.id() as i32);
        self.children.insert(pid, role);
        debug!(pid = pid.as_raw(), %role, "spawned");
        Ok(pid)
    }

    /// Reap one exited child without blocking.
    ///
    /// Returns `Ok(None)` when nothing has exited yet or when no children
    /// are left at all.
    pub fn reap_nonblocking(&mut self) -> Result<Option<Reaped>> {
        loop {
            match waitpid(None::<Pid>, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => return Ok(None),
                Ok(status) => {
                    if let Some(reaped) = self.record(status) {
                        return Ok(Some(reaped));
                    }
                }
                Err(Errno::ECHILD) => return Ok(None),
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(Error::Wait(errno)),
            }
        }
    }

    /// Block until `pid` exits.
    pub fn wait_for(&mut self, pid: Pid) -> Result<Reaped> {
        loop {
            match waitpid(pid, None) {
                Ok(status) => {
                    if let Some(reaped) = self.record(status) {
                        return Ok(reaped);
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(Error::Wait(errno)),
            }
        }
    }

    /// Block until every tracked child has exited.
    pub fn wait_all(&mut self) -> Result<Vec<Reaped>> {
        let pids: Vec<Pid> = self.children.keys().copied().collect();
        let mut reaped = Vec::with_capacity(pids.len());
        for pid in pids {
            match self.wait_for(pid) {
                Ok(r) => reaped.push(r),
                // Already collected by someone else
                Err(Error::Wait(Errno::ECHILD)) => {
                    self.children.remove(&pid);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(reaped)
    }

    pub fn role_of(&self, pid: Pid) -> Option<ProcessRole> {
        self.children.get(&pid).copied()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn record(&mut self, status: WaitStatus) -> Option<Reaped> {
        let (pid, outcome) = exit_outcome(status)?;
        let role = self.children.remove(&pid);
        Some(Reaped { pid, role, outcome })
    }
}

/// Map a terminal wait status to an [`ExitOutcome`].
///
/// Stop/continue/ptrace notifications are not exits and map to `None`.
pub fn exit_outcome(status: WaitStatus) -> Option<(Pid, ExitOutcome)> {
    match status {
        WaitStatus::Exited(pid, code) => Some((pid, ExitOutcome::Exited(code))),
        WaitStatus::Signaled(pid, signal, _) => Some((pid, ExitOutcome::Signaled(signal as i32))),
        _ => None,
    }
}

/// Replace the current process image with `command`.
///
/// Only returns if exec failed.
pub fn exec_direct(command: &[String]) -> Error {
    let Some((program, args)) = command.split_first() else {
        return preoom_core::ConfigError::EmptyCommand.into();
    };
    let source = Command::new(program).args(args).exec();
    Error::Exec {
        program: program.clone(),
        source,
    }
}
