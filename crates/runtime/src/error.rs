//! Error types for the DevTools runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while launching or talking to a browser.
#[derive(Debug, Error)]
pub enum Error {
	/// No Chromium-family executable could be located.
	#[error("Chromium not found. Install Chrome/Chromium or set DEVTOOLS_CHROME_PATH.")]
	BrowserNotFound,

	/// Failed to launch the browser process.
	#[error("Failed to launch browser: {0}")]
	LaunchFailed(String),

	/// Failed to establish the WebSocket connection.
	#[error("Failed to connect to browser: {0}")]
	ConnectionFailed(String),

	/// Transport-level error (WebSocket read/write).
	#[error("Transport error: {0}")]
	TransportError(String),

	/// Protocol-level error (malformed or unexpected message).
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// Error reported by the browser for a specific command.
	#[error("{method}: {message} (code {code})")]
	Remote {
		/// Method the failing request invoked.
		method: String,
		/// DevTools protocol error code.
		code: i64,
		/// Human-readable error message.
		message: String,
	},

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// Timeout waiting for an operation.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// Target (tab or browser) was closed.
	#[error("Target closed: {0}")]
	TargetClosed(String),

	/// Channel closed unexpectedly (the connection went away).
	#[error("Channel closed unexpectedly")]
	ChannelClosed,
}

impl Error {
	/// Returns true if the error means the tab or browser is gone.
	pub fn is_target_closed(&self) -> bool {
		match self {
			Error::TargetClosed(_) | Error::ChannelClosed => true,
			Error::Remote { message, .. } => {
				message.contains("Target closed")
					|| message.contains("No target with given id")
					|| message.contains("Session with given id not found")
			}
			_ => false,
		}
	}
}
