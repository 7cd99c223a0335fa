//! Error types for debugger attachment.

use thiserror::Error;

/// Result type alias for attach operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by sessions, the reconciler and the DevTools client.
#[derive(Debug, Error)]
pub enum Error {
	/// `bring_to_front` was requested before the UI was ever opened.
	#[error("the debugger client has not been launched yet")]
	NotLaunched,

	/// The process has no child pid to signal.
	#[error("process '{name}' is not instrumented for debugging")]
	NotInstrumented { name: String },

	/// A best-effort wait on the DevTools front-end ran out of time.
	#[error("timed out after {timeout_ms}ms waiting for '{selector}'")]
	StartupTimeout { selector: String, timeout_ms: u64 },

	/// Sending the debugger-start signal failed.
	#[error("failed to signal process {pid}: {source}")]
	Signal {
		pid: u32,
		#[source]
		source: std::io::Error,
	},

	/// Signals are not available on this platform.
	#[error("starting a debugger by signal is not supported on this platform")]
	Unsupported,

	/// The tab failed to navigate.
	#[error("navigation to '{url}' failed: {reason}")]
	Navigation { url: String, reason: String },

	/// The keyboard has no definition for this key name.
	#[error("unknown key: '{0}'")]
	UnknownKey(String),

	/// Script evaluation in the tab threw.
	#[error("evaluation failed: {0}")]
	Evaluation(String),

	#[error(transparent)]
	Runtime(#[from] devtools_runtime::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true if the tab or browser behind the UI is gone.
	pub fn is_target_closed(&self) -> bool {
		matches!(self, Error::Runtime(e) if e.is_target_closed())
	}
}
