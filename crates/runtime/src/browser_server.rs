//! Browser process management.
//!
//! Launches a headful Chromium with remote debugging enabled on an ephemeral
//! port and extracts the browser-level WebSocket endpoint from its stderr.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, Command};

use crate::error::{Error, Result};
use crate::executable::find_chromium;

/// Default time allowed for the browser to print its DevTools endpoint.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

const LISTENING_PREFIX: &str = "DevTools listening on ";

/// Options for launching the browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
	/// Explicit executable; discovered with [`find_chromium`] when `None`.
	pub executable: Option<PathBuf>,
	/// Run without a visible window (only useful for tests).
	pub headless: bool,
	/// Extra command-line switches.
	pub args: Vec<String>,
	/// How long to wait for the DevTools endpoint.
	pub startup_timeout: Duration,
}

impl Default for LaunchOptions {
	fn default() -> Self {
		Self {
			executable: None,
			headless: false,
			args: Vec::new(),
			startup_timeout: DEFAULT_STARTUP_TIMEOUT,
		}
	}
}

impl LaunchOptions {
	pub fn executable(mut self, path: Option<PathBuf>) -> Self {
		self.executable = path;
		self
	}

	pub fn headless(mut self, headless: bool) -> Self {
		self.headless = headless;
		self
	}

	pub fn args(mut self, args: Vec<String>) -> Self {
		self.args = args;
		self
	}
}

/// A running browser process with remote debugging enabled.
///
/// The child is killed when this value is dropped, and its throwaway profile
/// directory removed.
#[derive(Debug)]
pub struct BrowserProcess {
	process: Child,
	ws_endpoint: String,
	_profile: TempDir,
}

impl BrowserProcess {
	/// Launches the browser and waits for its DevTools endpoint.
	///
	/// # Errors
	///
	/// Returns [`Error::BrowserNotFound`] if no executable can be located,
	/// [`Error::LaunchFailed`] if the process cannot be spawned or exits early,
	/// and [`Error::Timeout`] if no endpoint is printed in time.
	pub async fn launch(options: &LaunchOptions) -> Result<Self> {
		let executable = find_chromium(options.executable.as_deref())?;
		let profile = tempfile::Builder::new().prefix("devtools-attach-profile-").tempdir()?;

		let mut cmd = Command::new(&executable);
		cmd.args(launch_args(options, &profile))
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		tracing::debug!(target = "devtools.browser", executable = %executable.display(), "launching browser");

		let mut process = cmd
			.spawn()
			.map_err(|e| Error::LaunchFailed(format!("Failed to spawn {}: {e}", executable.display())))?;

		let stderr = process
			.stderr
			.take()
			.ok_or_else(|| Error::LaunchFailed("browser stderr was not captured".to_string()))?;
		let mut lines = BufReader::new(stderr).lines();

		let ws_endpoint = match tokio::time::timeout(options.startup_timeout, read_ws_endpoint(&mut lines)).await {
			Ok(Ok(endpoint)) => endpoint,
			Ok(Err(e)) => {
				let status = process.try_wait().ok().flatten();
				return Err(Error::LaunchFailed(match status {
					Some(status) => format!("browser exited with status {status}: {e}"),
					None => e.to_string(),
				}));
			}
			Err(_) => {
				let _ = process.start_kill();
				return Err(Error::Timeout(format!(
					"browser did not report a DevTools endpoint within {}ms",
					options.startup_timeout.as_millis()
				)));
			}
		};

		// Keep draining stderr so the browser never blocks on a full pipe.
		tokio::spawn(drain_stderr(lines));

		tracing::debug!(target = "devtools.browser", endpoint = %ws_endpoint, pid = ?process.id(), "browser ready");

		Ok(Self {
			process,
			ws_endpoint,
			_profile: profile,
		})
	}

	/// Browser-level WebSocket endpoint (`ws://127.0.0.1:<port>/devtools/browser/<id>`).
	pub fn ws_endpoint(&self) -> &str {
		&self.ws_endpoint
	}

	/// OS process id, if the process is still running.
	pub fn pid(&self) -> Option<u32> {
		self.process.id()
	}

	/// Kills the browser and waits briefly for it to exit.
	pub async fn kill(mut self) -> Result<()> {
		self.process
			.kill()
			.await
			.map_err(|e| Error::LaunchFailed(format!("Failed to kill process: {e}")))?;

		let _ = tokio::time::timeout(Duration::from_millis(500), self.process.wait()).await;

		Ok(())
	}
}

fn launch_args(options: &LaunchOptions, profile: &TempDir) -> Vec<String> {
	let mut args = vec![
		"--remote-debugging-port=0".to_string(),
		format!("--user-data-dir={}", profile.path().display()),
		"--no-first-run".to_string(),
		"--no-default-browser-check".to_string(),
	];
	if options.headless {
		args.push("--headless=new".to_string());
	}
	args.extend(options.args.iter().cloned());
	args.push("about:blank".to_string());
	args
}

/// Extracts the endpoint from a `DevTools listening on ws://...` line.
pub fn parse_ws_endpoint(line: &str) -> Option<&str> {
	let endpoint = line.trim().strip_prefix(LISTENING_PREFIX)?.trim();
	(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")).then_some(endpoint)
}

async fn read_ws_endpoint<R>(lines: &mut tokio::io::Lines<BufReader<R>>) -> Result<String>
where
	R: AsyncRead + Unpin,
{
	while let Some(line) = lines.next_line().await? {
		if let Some(endpoint) = parse_ws_endpoint(&line) {
			return Ok(endpoint.to_string());
		}
		tracing::trace!(target = "devtools.browser", %line, "browser stderr");
	}
	Err(Error::LaunchFailed("browser closed stderr before reporting a DevTools endpoint".to_string()))
}

async fn drain_stderr(mut lines: tokio::io::Lines<BufReader<ChildStderr>>) {
	while let Ok(Some(line)) = lines.next_line().await {
		tracing::trace!(target = "devtools.browser", %line, "browser stderr");
	}
}
