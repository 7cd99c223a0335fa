//! On-disk configuration, overridden by command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use devtools::{BrowserLaunchOptions, ClientOptions, PluginOptions};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::error::{CliError, Result};

const APP_DIR: &str = "devtools-attach";
const CONFIG_FILE: &str = "config.json";

/// Settings read from `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Key bound to the launch command.
	pub key: Option<String>,
	/// Chromium executable; discovered when unset.
	pub chrome: Option<PathBuf>,
	pub headless: bool,
	/// Budget for each wait of the first-tab panel preset.
	pub preset_timeout_ms: Option<u64>,
}

/// `<config dir>/devtools-attach/config.json`, if the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

impl Config {
	/// Loads `explicit`, or the default file when present.
	///
	/// An explicitly named file must exist; a missing default file yields
	/// the defaults.
	pub fn load(explicit: Option<&Path>) -> Result<Self> {
		match explicit {
			Some(path) => Self::read(path),
			None => match default_path() {
				Some(path) if path.is_file() => Self::read(&path),
				_ => Ok(Self::default()),
			},
		}
	}

	fn read(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
			path: path.to_path_buf(),
			source,
		})?;
		let config = serde_json::from_str(&content).map_err(|source| CliError::ConfigParse {
			path: path.to_path_buf(),
			source,
		})?;
		tracing::debug!(path = %path.display(), "loaded config");
		Ok(config)
	}

	/// Applies command-line overrides.
	pub fn merge_cli(mut self, cli: &Cli) -> Self {
		if let Some(key) = &cli.key {
			self.key = Some(key.clone());
		}
		if let Some(chrome) = &cli.chrome {
			self.chrome = Some(chrome.clone());
		}
		self.headless |= cli.headless;
		self
	}

	pub fn plugin_options(&self) -> PluginOptions {
		PluginOptions { key: self.key.clone() }
	}

	pub fn browser_options(&self) -> BrowserLaunchOptions {
		BrowserLaunchOptions::default()
			.executable(self.chrome.clone())
			.headless(self.headless)
	}

	pub fn client_options(&self) -> ClientOptions {
		let mut options = ClientOptions::default();
		if let Some(ms) = self.preset_timeout_ms {
			options.preset_timeout = Duration::from_millis(ms);
		}
		options
	}
}

#[cfg(test)]
mod tests {
	use clap::Parser;
	use tempfile::TempDir;

	use super::*;

	fn write(dir: &TempDir, content: &str) -> PathBuf {
		let path = dir.path().join(CONFIG_FILE);
		fs::write(&path, content).unwrap();
		path
	}

	#[test]
	fn loads_explicit_file() {
		let dir = TempDir::new().unwrap();
		let path = write(
			&dir,
			r#"{"key": "g", "chrome": "/opt/chrome", "headless": true, "preset_timeout_ms": 1500}"#,
		);

		let config = Config::load(Some(&path)).unwrap();
		assert_eq!(config.key.as_deref(), Some("g"));
		assert_eq!(config.chrome, Some(PathBuf::from("/opt/chrome")));
		assert!(config.headless);
		assert_eq!(config.client_options().preset_timeout, Duration::from_millis(1500));
	}

	#[test]
	fn missing_fields_use_defaults() {
		let dir = TempDir::new().unwrap();
		let path = write(&dir, "{}");

		let config = Config::load(Some(&path)).unwrap();
		assert_eq!(config, Config::default());
		assert_eq!(config.plugin_options().key(), "d");
		assert_eq!(config.client_options().preset_timeout, Duration::from_secs(5));
	}

	#[test]
	fn missing_explicit_file_is_an_error() {
		let dir = TempDir::new().unwrap();
		let err = Config::load(Some(&dir.path().join("absent.json"))).unwrap_err();
		assert!(matches!(err, CliError::ConfigRead { .. }));
	}

	#[test]
	fn malformed_file_is_an_error() {
		let dir = TempDir::new().unwrap();
		let path = write(&dir, "{ key: ");
		let err = Config::load(Some(&path)).unwrap_err();
		assert!(matches!(err, CliError::ConfigParse { .. }));
	}

	#[test]
	fn cli_flags_override_file() {
		let file = Config {
			key: Some("g".into()),
			chrome: Some(PathBuf::from("/opt/chrome")),
			headless: false,
			preset_timeout_ms: None,
		};
		let cli = Cli::try_parse_from([
			"devtools-attach",
			"watch",
			"--key",
			"x",
			"--headless",
		])
		.unwrap();

		let merged = file.merge_cli(&cli);
		assert_eq!(merged.key.as_deref(), Some("x"));
		assert_eq!(merged.chrome, Some(PathBuf::from("/opt/chrome")));
		assert!(merged.headless);

		let browser = merged.browser_options();
		assert!(browser.headless);
		assert_eq!(browser.executable, Some(PathBuf::from("/opt/chrome")));
	}
}
