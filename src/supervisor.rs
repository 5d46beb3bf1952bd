//! Owns every process the window manager launches.
//!
//! Actions never fork. They queue a [`LaunchIntent`]; the event loop hands it
//! to the [`Supervisor`], which also reaps children when SIGCHLD arrives and
//! reports each exit back as an ordinary event.

use std::{
    io,
    os::unix::process::{CommandExt, ExitStatusExt},
    process::{Child, Command, ExitStatus},
};

use crate::errors::{Result, WmError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchIntent {
    pub argv: Vec<String>,
}

impl LaunchIntent {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChildExit {
    pub pid: u32,
    /// Exit status, or `None` when the child was killed by a signal.
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ChildExit {
    fn from_status(pid: u32, status: ExitStatus) -> Self {
        Self {
            pid,
            code: status.code(),
            signal: status.signal(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Supervisor {
    children: Vec<Child>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of children not yet reaped.
    pub fn running(&self) -> usize {
        self.children.len()
    }

    /// Starts `intent` in its own session and returns the child's pid.
    pub fn launch(&mut self, intent: &LaunchIntent) -> Result<u32> {
        let Some((program, args)) = intent.argv.split_first() else {
            return Err(WmError::Spawn {
                command: String::new(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        let mut command = Command::new(program);
        command.args(args);
        // SAFETY: the hook only calls async-signal-safe libc functions.
        unsafe {
            command.pre_exec(detach_from_session);
        }

        let child = command.spawn().map_err(|source| WmError::Spawn {
            command: intent.command_line(),
            source,
        })?;
        let pid = child.id();
        tracing::info!(pid, command = %intent.command_line(), "launched process");
        self.children.push(child);
        Ok(pid)
    }

    /// Collects every child that has exited since the last call.
    pub fn reap(&mut self) -> Vec<ChildExit> {
        let mut exits = Vec::new();
        self.children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                exits.push(ChildExit::from_status(child.id(), status));
                false
            }
            Ok(None) => true,
            Err(err) => {
                tracing::warn!(pid = child.id(), "failed to poll child: {err}");
                false
            }
        });
        exits
    }
}

/// Runs in the child between fork and exec.
///
/// The event loop blocks SIGCHLD to read it from a signalfd, and that mask
/// would otherwise be inherited by everything we launch.
fn detach_from_session() -> io::Result<()> {
    unsafe {
        if libc::setsid() == -1 {
            return Err(io::Error::last_os_error());
        }
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        if libc::sigprocmask(libc::SIG_SETMASK, &set, std::ptr::null_mut()) == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
