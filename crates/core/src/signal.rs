//! Asking a running process to start its inspector.
//!
//! Node-style runtimes open their inspector when they receive `SIGUSR1`, so
//! restarting a debugger is a matter of signalling the child pid.

use crate::error::{Error, Result};
use crate::process::Process;

/// Requests that a process start (or restart) its debugger.
pub trait DebuggerStarter: Send + Sync {
	fn request_start(&self, process: &Process) -> Result<()>;
}

/// [`DebuggerStarter`] that sends `SIGUSR1` to the child pid.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalStarter;

impl DebuggerStarter for SignalStarter {
	fn request_start(&self, process: &Process) -> Result<()> {
		let pid = process.pid().ok_or_else(|| Error::NotInstrumented {
			name: process.name.clone(),
		})?;
		tracing::info!(target = "devtools.signal", process = %process.name, pid, "requesting debugger start");
		send_start_signal(pid)
	}
}

#[cfg(unix)]
fn send_start_signal(pid: u32) -> Result<()> {
	let raw = i32::try_from(pid).map_err(|_| Error::Signal {
		pid,
		source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
	})?;
	// SAFETY: kill has no memory-safety preconditions.
	if unsafe { libc::kill(raw, libc::SIGUSR1) } == 0 {
		Ok(())
	} else {
		Err(Error::Signal {
			pid,
			source: std::io::Error::last_os_error(),
		})
	}
}

#[cfg(not(unix))]
fn send_start_signal(_pid: u32) -> Result<()> {
	Err(Error::Unsupported)
}

/// Whether a process with `pid` exists.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
	let Ok(raw) = i32::try_from(pid) else {
		return false;
	};
	if raw <= 0 {
		return false;
	}
	// SAFETY: kill(pid, 0) probes existence without delivering a signal.
	if unsafe { libc::kill(raw, 0) } == 0 {
		return true;
	}
	matches!(
		std::io::Error::last_os_error().raw_os_error(),
		Some(code) if code == libc::EPERM
	)
}

/// Whether a process with `pid` exists. Always true where it cannot be probed.
#[cfg(not(unix))]
pub fn process_alive(_pid: u32) -> bool {
	true
}
