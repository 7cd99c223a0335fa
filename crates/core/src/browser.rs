//! The shared Chromium instance hosting debugger tabs.

use std::sync::Arc;

use async_trait::async_trait;
use devtools_runtime::{BrowserProcess, Connection, LaunchOptions};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::page::Page;

/// A connected Chromium and, when this crate started it, its process.
///
/// Dropping a launched browser kills it.
pub struct Browser {
	process: Option<BrowserProcess>,
	connection: Arc<Connection>,
}

impl Browser {
	/// Launches Chromium and connects to its DevTools endpoint.
	pub async fn launch(options: &LaunchOptions) -> Result<Self> {
		let process = BrowserProcess::launch(options).await?;
		let connection = Connection::open(process.ws_endpoint()).await?;
		let mut browser = Self::connect(connection).await?;

		tracing::info!(
			target = "devtools.browser",
			endpoint = process.ws_endpoint(),
			pid = ?process.pid(),
			"browser launched"
		);
		browser.process = Some(process);
		Ok(browser)
	}

	/// Wraps an established browser-level connection and enables target
	/// discovery on it.
	pub(crate) async fn connect(connection: Arc<Connection>) -> Result<Self> {
		connection
			.send(None, "Target.setDiscoverTargets", json!({ "discover": true }))
			.await?;
		Ok(Self {
			process: None,
			connection,
		})
	}

	/// Whether the browser connection is still up.
	pub fn is_connected(&self) -> bool {
		!self.connection.is_closed()
	}

	/// Attaches to the tab the browser opened at startup, or opens one.
	pub async fn first_page(&self) -> Result<Page> {
		let targets = self.connection.send(None, "Target.getTargets", json!({})).await?;
		let existing = targets
			.get("targetInfos")
			.and_then(Value::as_array)
			.and_then(|infos| {
				infos
					.iter()
					.find(|info| info.get("type").and_then(Value::as_str) == Some("page"))
			})
			.and_then(|info| info.get("targetId").and_then(Value::as_str))
			.map(str::to_string);

		match existing {
			Some(target_id) => Page::attach(Arc::clone(&self.connection), &target_id).await,
			None => self.new_page().await,
		}
	}

	/// Opens a new blank tab.
	pub async fn new_page(&self) -> Result<Page> {
		let created = self
			.connection
			.send(None, "Target.createTarget", json!({ "url": "about:blank" }))
			.await?;
		let target_id = created.get("targetId").and_then(Value::as_str).ok_or_else(|| {
			devtools_runtime::Error::ProtocolError("createTarget returned no targetId".to_string())
		})?;
		Page::attach(Arc::clone(&self.connection), target_id).await
	}
}

impl std::fmt::Debug for Browser {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Browser")
			.field("pid", &self.process.as_ref().and_then(BrowserProcess::pid))
			.field("connected", &self.is_connected())
			.finish()
	}
}

/// Starts the browser a [`BrowserManager`] hands tabs out of.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
	async fn launch(&self) -> Result<Browser>;
}

/// Launches a local Chromium with fixed options.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
	options: LaunchOptions,
}

impl ChromiumLauncher {
	pub fn new(options: LaunchOptions) -> Self {
		Self { options }
	}
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
	async fn launch(&self) -> Result<Browser> {
		Browser::launch(&self.options).await
	}
}

/// A tab handed out by [`BrowserManager::acquire_page`].
#[derive(Debug)]
pub struct AcquiredPage {
	pub page: Page,
	/// True when the browser was launched to serve this request.
	pub fresh_browser: bool,
}

/// Lazily launches one browser and hands out tabs in it.
///
/// A browser whose connection dropped (the user quit it) is replaced on the
/// next request.
pub struct BrowserManager {
	launcher: Box<dyn BrowserLauncher>,
	current: Mutex<Option<Arc<Browser>>>,
}

impl BrowserManager {
	/// Manager launching a local Chromium with `options`.
	pub fn new(options: LaunchOptions) -> Self {
		Self::with_launcher(ChromiumLauncher::new(options))
	}

	pub fn with_launcher(launcher: impl BrowserLauncher + 'static) -> Self {
		Self {
			launcher: Box::new(launcher),
			current: Mutex::new(None),
		}
	}

	/// Returns a tab: the startup tab of a new browser, or a new tab in the
	/// running one.
	pub async fn acquire_page(&self) -> Result<AcquiredPage> {
		let mut current = self.current.lock().await;

		if let Some(browser) = current.as_ref().filter(|browser| browser.is_connected()) {
			let page = browser.new_page().await?;
			return Ok(AcquiredPage {
				page,
				fresh_browser: false,
			});
		}

		if current.take().is_some() {
			tracing::debug!(target = "devtools.browser", "previous browser disconnected; relaunching");
		}

		let browser = Arc::new(self.launcher.launch().await?);
		let page = browser.first_page().await?;
		*current = Some(browser);

		Ok(AcquiredPage {
			page,
			fresh_browser: true,
		})
	}
}

impl std::fmt::Debug for BrowserManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BrowserManager").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fake_browser::FakeLauncher;

	fn browser_level_methods(launcher: &FakeLauncher) -> Vec<String> {
		launcher
			.last()
			.received()
			.into_iter()
			.filter(|r| r.session_id.is_none())
			.map(|r| r.method)
			.collect()
	}

	#[tokio::test]
	async fn running_browser_is_reused_for_later_tabs() {
		let launcher = FakeLauncher::new(true);
		let manager = BrowserManager::with_launcher(launcher.clone());

		let first = manager.acquire_page().await.unwrap();
		let second = manager.acquire_page().await.unwrap();

		assert!(first.fresh_browser);
		assert_eq!(first.page.target_id(), "T0");
		assert!(!second.fresh_browser);
		assert_eq!(second.page.target_id(), "T1");
		assert_eq!(launcher.launched().len(), 1);
		assert_eq!(
			browser_level_methods(&launcher),
			[
				"Target.setDiscoverTargets",
				"Target.getTargets",
				"Target.attachToTarget",
				"Target.createTarget",
				"Target.attachToTarget",
			]
		);
	}

	#[tokio::test]
	async fn quit_browser_is_relaunched() {
		let launcher = FakeLauncher::new(true);
		let manager = BrowserManager::with_launcher(launcher.clone());

		let first = manager.acquire_page().await.unwrap();
		launcher.last().quit().await;
		let mut closed = first.page.on_close();
		assert!(closed.wait_for(|closed| *closed).await.is_ok());

		let second = manager.acquire_page().await.unwrap();

		assert!(second.fresh_browser);
		assert_eq!(second.page.target_id(), "T0");
		assert_eq!(launcher.launched().len(), 2);
	}
}
