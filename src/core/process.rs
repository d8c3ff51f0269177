//! Pid file and OS-level process liveness.
//!
//! The pid file is only a liveness token: whether a node is alive is always
//! decided by probing the recorded pid, never by the status file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::warn;

/// Persisted process id of the supervised node
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded pid, or 0 when there is no usable record
    pub fn read(&self) -> u32 {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return 0;
        };

        match content.trim().parse::<u32>() {
            Ok(pid) => pid,
            Err(_) => {
                warn!(path = %self.path.display(), "Ignoring unreadable pid file");
                0
            }
        }
    }

    /// Replace the record wholesale
    pub fn write(&self, pid: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        std::fs::write(&self.path, pid.to_string())
            .with_context(|| format!("Failed to write pid file: {}", self.path.display()))
    }
}

fn to_pid(pid: u32) -> Option<Pid> {
    i32::try_from(pid).ok().filter(|p| *p > 0).map(Pid::from_raw)
}

/// True if a process with this pid exists
pub fn is_alive(pid: u32) -> bool {
    let Some(pid) = to_pid(pid) else {
        return false;
    };

    match kill(pid, None) {
        Ok(()) => true,
        // Exists, but owned by someone else
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Deliver `signal` to `pid`. A process that is already gone is not an error.
pub fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    let Some(target) = to_pid(pid) else {
        return Ok(());
    };

    match kill(target, signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to send {:?} to process {}", signal, pid)),
    }
}
