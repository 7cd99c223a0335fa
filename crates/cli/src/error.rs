use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("failed to read config {}", path.display())]
	ConfigRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid config {}", path.display())]
	ConfigParse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("invalid inspector address '{0}' (expected HOST:PORT)")]
	InspectorAddress(String),

	/// The launch command did not leave a session behind; the reason was logged.
	#[error("could not launch the debugger for '{name}' (run with -v for details)")]
	LaunchFailed { name: String },

	#[error("http client: {0}")]
	Http(#[from] reqwest::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}
