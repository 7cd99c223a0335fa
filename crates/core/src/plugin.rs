//! Adapter between a process supervisor's command surface and the reconciler.
//!
//! The host calls [`DebuggerPlugin::update`] whenever a process record
//! changes and asks [`DebuggerPlugin::commands`] which key bindings to offer
//! for the selected process.

use std::sync::Arc;

use devtools_runtime::LaunchOptions as BrowserLaunchOptions;
use serde::{Deserialize, Serialize};

use crate::browser::BrowserManager;
use crate::client::{ClientOptions, DevToolsFactory};
use crate::process::Process;
use crate::reconciler::{LaunchOptions, Reconciler};
use crate::registry::SessionRegistry;
use crate::signal::SignalStarter;

/// Key bound to the launch command when none is configured.
pub const DEFAULT_KEY: &str = "d";

/// Label shown next to the launch command.
pub const LAUNCH_VERB: &str = "launch debugger";

/// Options recognised by the plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginOptions {
	#[serde(default)]
	pub key: Option<String>,
}

impl PluginOptions {
	/// The configured key, or [`DEFAULT_KEY`].
	pub fn key(&self) -> &str {
		self.key.as_deref().filter(|key| !key.is_empty()).unwrap_or(DEFAULT_KEY)
	}
}

/// Debugger plugin state shared by every command it hands out.
///
/// Cheap to clone.
#[derive(Debug, Clone)]
pub struct DebuggerPlugin {
	reconciler: Arc<Reconciler>,
	registry: SessionRegistry,
	options: Arc<PluginOptions>,
}

impl DebuggerPlugin {
	pub fn new(reconciler: Reconciler, options: PluginOptions) -> Self {
		Self {
			reconciler: Arc::new(reconciler),
			registry: SessionRegistry::new(),
			options: Arc::new(options),
		}
	}

	/// Plugin wired to Chromium DevTools tabs and `SIGUSR1` restarts.
	pub fn with_devtools(browser: BrowserLaunchOptions, client: ClientOptions, options: PluginOptions) -> Self {
		let manager = Arc::new(BrowserManager::new(browser));
		let reconciler = Reconciler::new(
			Arc::new(DevToolsFactory::new(manager, client)),
			Arc::new(SignalStarter),
		);
		Self::new(reconciler, options)
	}

	pub fn registry(&self) -> &SessionRegistry {
		&self.registry
	}

	/// Reconciles `process`'s session after the supervisor saw it change.
	///
	/// Failures are logged, not returned.
	pub async fn update(&self, process: &Process) {
		if let Err(e) = self.reconciler.reconcile(&self.registry, process).await {
			tracing::warn!(target = "devtools.plugin", process = %process.name, error = %e, "debugger update failed");
		}
	}

	/// Commands to offer for `process`, keyed by their binding.
	///
	/// Empty unless the process has a child pid.
	pub fn commands(&self, process: &Process) -> Vec<(String, LaunchCommand)> {
		if !process.is_debuggable() {
			return Vec::new();
		}
		let command = LaunchCommand {
			plugin: self.clone(),
			process: process.clone(),
		};
		vec![(self.options.key().to_string(), command)]
	}
}

/// The "launch debugger" command for one process.
#[derive(Debug, Clone)]
pub struct LaunchCommand {
	plugin: DebuggerPlugin,
	process: Process,
}

impl LaunchCommand {
	pub fn verb(&self) -> &'static str {
		LAUNCH_VERB
	}

	/// Opens (or re-focuses) the debugger. Failures are logged, not returned.
	pub async fn toggle(&self) {
		let DebuggerPlugin { reconciler, registry, .. } = &self.plugin;
		if let Err(e) = reconciler
			.launch(registry, &self.process, LaunchOptions::activated())
			.await
		{
			tracing::warn!(target = "devtools.plugin", process = %self.process.name, error = %e, "debugger launch failed");
		}
	}
}
