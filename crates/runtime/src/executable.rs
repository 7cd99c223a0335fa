//! Chromium executable discovery.
//!
//! DevTools front-ends can only be opened from inside a Chromium-family
//! browser (`chrome-devtools://` URLs are not reachable from the command
//! line), so a local Chrome/Chromium install is required.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Error, Result};

/// Environment variables consulted before any other lookup, in order.
pub const EXECUTABLE_ENV_VARS: [&str; 2] = ["DEVTOOLS_CHROME_PATH", "CHROME_PATH"];

/// Binary names searched for on `PATH`.
const BINARY_NAMES: [&str; 6] = [
	"google-chrome",
	"google-chrome-stable",
	"chromium",
	"chromium-browser",
	"chrome",
	"msedge",
];

#[cfg(target_os = "macos")]
const COMMON_LOCATIONS: [&str; 3] = [
	"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
	"/Applications/Chromium.app/Contents/MacOS/Chromium",
	"/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
];

#[cfg(windows)]
const COMMON_LOCATIONS: [&str; 3] = [
	"C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe",
	"C:\\Program Files (x86)\\Google\\Chrome\\Application\\chrome.exe",
	"C:\\Program Files (x86)\\Microsoft\\Edge\\Application\\msedge.exe",
];

#[cfg(not(any(target_os = "macos", windows)))]
const COMMON_LOCATIONS: [&str; 4] = [
	"/usr/bin/google-chrome",
	"/usr/bin/chromium",
	"/usr/bin/chromium-browser",
	"/snap/bin/chromium",
];

/// Locates the browser executable.
///
/// Lookup order:
/// 1. `explicit` (from configuration or the command line)
/// 2. `DEVTOOLS_CHROME_PATH`, then `CHROME_PATH`
/// 3. Well-known binary names on `PATH`
/// 4. Platform install locations
///
/// # Errors
///
/// Returns [`Error::BrowserNotFound`] if nothing usable exists.
pub fn find_chromium(explicit: Option<&Path>) -> Result<PathBuf> {
	let from_env = EXECUTABLE_ENV_VARS
		.iter()
		.filter_map(|name| std::env::var_os(name).map(|value| (*name, PathBuf::from(value))));

	resolve_executable(explicit, from_env, |name| which::which(name).ok(), &COMMON_LOCATIONS)
}

fn resolve_executable<I, W>(explicit: Option<&Path>, from_env: I, which: W, common_locations: &[&str]) -> Result<PathBuf>
where
	I: IntoIterator<Item = (&'static str, PathBuf)>,
	W: Fn(&str) -> Option<PathBuf>,
{
	if let Some(path) = explicit {
		if path.exists() {
			return Ok(path.to_path_buf());
		}
		warn!(target = "devtools.browser", path = %path.display(), "configured browser executable does not exist");
	}

	for (name, path) in from_env {
		if path.exists() {
			return Ok(path);
		}
		warn!(target = "devtools.browser", var = name, path = %path.display(), "browser executable from environment does not exist");
	}

	if let Some(path) = BINARY_NAMES.iter().find_map(|name| which(name)) {
		return Ok(path);
	}

	common_locations
		.iter()
		.map(PathBuf::from)
		.find(|path| path.exists())
		.ok_or(Error::BrowserNotFound)
}
