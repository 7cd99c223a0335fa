//! [`UiSession`] backed by a Chromium tab running the DevTools front-end.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::browser::{AcquiredPage, BrowserManager};
use crate::error::{Error, Result};
use crate::page::{Modifier, Page};
use crate::ui::{Invalidation, Invalidator, UiFactory, UiSession};

/// DevTools front-end bundled with Chromium, in its standalone-V8 flavour.
pub const FRONT_END_BASE_URL: &str = "chrome-devtools://devtools/bundled/js_app.html?experiments=true&v8only=true";

const MAIN_PANE_SELECTOR: &str = ".tabbed-pane.insertion-point-main";
const SOURCES_VIEW_SELECTOR: &str = "#sources-panel-sources-view";

/// Timeouts for driving the front-end tab.
#[derive(Debug, Clone)]
pub struct ClientOptions {
	/// Budget for loading the front-end page.
	pub navigation_timeout: Duration,
	/// Budget for each wait of the panel preset.
	pub preset_timeout: Duration,
}

impl Default for ClientOptions {
	fn default() -> Self {
		Self {
			navigation_timeout: Duration::from_secs(30),
			preset_timeout: Duration::from_secs(5),
		}
	}
}

/// Builds the front-end URL that connects to `inspector_url`.
///
/// The scheme is stripped; `wss://` URLs use the `wss` parameter.
pub fn front_end_url(inspector_url: &str) -> String {
	match inspector_url.strip_prefix("wss://") {
		Some(rest) => format!("{FRONT_END_BASE_URL}&wss={rest}"),
		None => {
			let rest = inspector_url.strip_prefix("ws://").unwrap_or(inspector_url);
			format!("{FRONT_END_BASE_URL}&ws={rest}")
		}
	}
}

/// One DevTools tab in the shared browser.
pub struct DevToolsClient {
	browser: Arc<BrowserManager>,
	options: ClientOptions,
	/// URL the front-end last loaded successfully.
	loaded_url: Option<String>,
	title: String,
	page: Option<Page>,
	invalidator: Invalidator,
}

impl DevToolsClient {
	pub fn new(browser: Arc<BrowserManager>, options: ClientOptions) -> Self {
		Self {
			browser,
			options,
			loaded_url: None,
			title: String::new(),
			page: None,
			invalidator: Invalidator::new(),
		}
	}

	fn page(&self) -> Result<&Page> {
		self.page.as_ref().ok_or(Error::NotLaunched)
	}

	async fn load_front_end(&mut self, inspector_url: &str) -> Result<()> {
		let page = self.page()?;
		page.goto(&front_end_url(inspector_url), self.options.navigation_timeout)
			.await?;
		if !self.title.is_empty() {
			page.set_title(&self.title).await?;
		}
		self.loaded_url = Some(inspector_url.to_string());
		Ok(())
	}

	/// Invalidates this client once `page` closes.
	fn watch_close(&self, page: &Page) {
		let mut closed = page.on_close();
		let invalidator = self.invalidator.clone();
		let target_id = page.target_id().to_string();

		tokio::spawn(async move {
			let _ = closed.wait_for(|closed| *closed).await;
			if invalidator.invalidate() {
				tracing::debug!(target = "devtools.client", %target_id, "debugger tab closed");
			}
		});
	}
}

#[async_trait]
impl UiSession for DevToolsClient {
	async fn open(&mut self, inspector_url: &str, title: &str) -> Result<()> {
		if self.page.is_some() {
			return self.reload(inspector_url).await;
		}

		self.title = title.to_string();
		let AcquiredPage { page, fresh_browser } = self.browser.acquire_page().await?;
		self.watch_close(&page);
		self.page = Some(page.clone());

		self.load_front_end(inspector_url).await?;

		if fresh_browser {
			if let Err(e) = apply_panel_preset(&page, self.options.preset_timeout).await {
				tracing::debug!(target = "devtools.client", error = %e, "panel preset skipped");
			}
		}
		Ok(())
	}

	async fn reload(&mut self, inspector_url: &str) -> Result<()> {
		if self.loaded_url.as_deref() == Some(inspector_url) {
			return Ok(());
		}
		if self.page.is_none() {
			return Ok(());
		}
		self.load_front_end(inspector_url).await
	}

	async fn bring_to_front(&self) -> Result<()> {
		self.page()?.bring_to_front().await
	}

	fn is_open(&self) -> bool {
		self.page.is_some()
	}

	fn invalidated(&self) -> Invalidation {
		self.invalidator.subscribe()
	}
}

/// Switches a fresh front-end to the Sources panel with the console drawer.
async fn apply_panel_preset(page: &Page, timeout: Duration) -> Result<()> {
	page.wait_for_selector(MAIN_PANE_SELECTOR, timeout).await?;

	let mut keyboard = page.keyboard();
	keyboard.chord(Modifier::platform(), "BracketRight").await?;

	page.wait_for_selector(SOURCES_VIEW_SELECTOR, timeout).await?;
	keyboard.press("Escape").await
}

/// Creates [`DevToolsClient`]s sharing one [`BrowserManager`].
#[derive(Debug, Clone)]
pub struct DevToolsFactory {
	browser: Arc<BrowserManager>,
	options: ClientOptions,
}

impl DevToolsFactory {
	pub fn new(browser: Arc<BrowserManager>, options: ClientOptions) -> Self {
		Self { browser, options }
	}
}

impl UiFactory for DevToolsFactory {
	fn create(&self) -> Box<dyn UiSession> {
		Box::new(DevToolsClient::new(Arc::clone(&self.browser), self.options.clone()))
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::fake_browser::FakeLauncher;

	const URL_A: &str = "ws://127.0.0.1:9229/a";
	const URL_B: &str = "ws://127.0.0.1:9229/b";

	fn manager(launcher: &FakeLauncher) -> Arc<BrowserManager> {
		Arc::new(BrowserManager::with_launcher(launcher.clone()))
	}

	fn expressions(params: Vec<serde_json::Value>) -> Vec<String> {
		params
			.iter()
			.filter_map(|p| p["expression"].as_str().map(str::to_string))
			.collect()
	}

	fn preset_keys() -> Vec<(String, String)> {
		let modifier = Modifier::platform().key_name();
		[
			("rawKeyDown", modifier),
			("keyDown", "]"),
			("keyUp", "]"),
			("keyUp", modifier),
			("rawKeyDown", "Escape"),
			("keyUp", "Escape"),
		]
		.into_iter()
		.map(|(kind, key)| (kind.to_string(), key.to_string()))
		.collect()
	}

	#[test]
	fn strips_ws_scheme() {
		assert_eq!(
			front_end_url("ws://127.0.0.1:9229/0f2c9a"),
			format!("{FRONT_END_BASE_URL}&ws=127.0.0.1:9229/0f2c9a")
		);
	}

	#[test]
	fn secure_urls_use_wss_parameter() {
		assert_eq!(
			front_end_url("wss://debug.example.com/abc"),
			format!("{FRONT_END_BASE_URL}&wss=debug.example.com/abc")
		);
	}

	#[test]
	fn schemeless_urls_pass_through() {
		assert!(front_end_url("localhost:9229/x").ends_with("&ws=localhost:9229/x"));
	}

	#[tokio::test]
	async fn unopened_client_cannot_come_to_front() {
		let manager = Arc::new(BrowserManager::new(Default::default()));
		let client = DevToolsClient::new(manager, ClientOptions::default());

		assert!(!client.is_open());
		assert!(matches!(client.bring_to_front().await, Err(Error::NotLaunched)));
	}

	#[tokio::test]
	async fn reload_before_open_is_a_no_op() {
		let manager = Arc::new(BrowserManager::new(Default::default()));
		let mut client = DevToolsClient::new(manager, ClientOptions::default());

		client.reload("ws://127.0.0.1:9229/a").await.unwrap();
		assert!(!client.is_open());
		assert!(!client.invalidated().is_invalidated());
	}

	#[tokio::test]
	async fn open_loads_front_end_and_titles_tab() {
		let launcher = FakeLauncher::new(true);
		let mut client = DevToolsClient::new(manager(&launcher), ClientOptions::default());

		client.open(URL_A, "api").await.unwrap();

		let browser = launcher.last();
		let methods = browser.methods_on("S-T0");
		assert_eq!(methods[..3], ["Page.enable", "Page.navigate", "Runtime.evaluate"]);
		assert_eq!(
			browser.params_of("S-T0", "Page.navigate"),
			vec![json!({ "url": front_end_url(URL_A) })]
		);
		assert_eq!(
			expressions(browser.params_of("S-T0", "Runtime.evaluate"))[0],
			r#"document.title = "api""#
		);
		assert!(client.is_open());
	}

	#[tokio::test]
	async fn fresh_browser_gets_panel_preset() {
		let launcher = FakeLauncher::new(true);
		let mut client = DevToolsClient::new(manager(&launcher), ClientOptions::default());

		client.open(URL_A, "api").await.unwrap();

		assert_eq!(launcher.last().key_events_on("S-T0"), preset_keys());
	}

	#[tokio::test]
	async fn preset_runs_once_per_browser() {
		let launcher = FakeLauncher::new(true);
		let manager = manager(&launcher);
		let mut first = DevToolsClient::new(Arc::clone(&manager), ClientOptions::default());
		let mut second = DevToolsClient::new(Arc::clone(&manager), ClientOptions::default());

		first.open(URL_A, "api").await.unwrap();
		second.open(URL_B, "worker").await.unwrap();

		assert_eq!(launcher.launched().len(), 1);
		let browser = launcher.last();
		assert_eq!(browser.key_events_on("S-T0"), preset_keys());
		assert_eq!(browser.methods_on("S-T1")[..3], ["Page.enable", "Page.navigate", "Runtime.evaluate"]);
		assert!(browser.key_events_on("S-T1").is_empty());

		// A browser launched after the first one quit is fresh again.
		browser.quit().await;
		let mut third = DevToolsClient::new(Arc::clone(&manager), ClientOptions::default());
		third.open(URL_A, "api").await.unwrap();

		assert_eq!(launcher.launched().len(), 2);
		assert_eq!(launcher.last().key_events_on("S-T0"), preset_keys());
	}

	#[tokio::test]
	async fn preset_timeout_does_not_fail_open() {
		let launcher = FakeLauncher::new(false);
		let options = ClientOptions {
			preset_timeout: Duration::from_millis(250),
			..ClientOptions::default()
		};
		let mut client = DevToolsClient::new(manager(&launcher), options);

		client.open(URL_A, "api").await.unwrap();

		let browser = launcher.last();
		let polls = expressions(browser.params_of("S-T0", "Runtime.evaluate"))
			.into_iter()
			.filter(|e| e.contains(MAIN_PANE_SELECTOR))
			.count();
		assert!(polls >= 2, "expected repeated visibility polls, got {polls}");
		assert!(browser.key_events_on("S-T0").is_empty());
		assert!(client.is_open());
	}

	#[tokio::test]
	async fn open_on_shown_url_is_a_no_op_and_reload_renavigates() {
		let launcher = FakeLauncher::new(true);
		let mut client = DevToolsClient::new(manager(&launcher), ClientOptions::default());
		let browser = || launcher.last();

		client.open(URL_A, "api").await.unwrap();
		client.open(URL_A, "api").await.unwrap();
		assert_eq!(browser().params_of("S-T0", "Page.navigate").len(), 1);

		client.reload(URL_B).await.unwrap();
		let navigations = browser().params_of("S-T0", "Page.navigate");
		assert_eq!(navigations.len(), 2);
		assert_eq!(navigations[1], json!({ "url": front_end_url(URL_B) }));
		let titles = expressions(browser().params_of("S-T0", "Runtime.evaluate"))
			.into_iter()
			.filter(|e| e.starts_with("document.title"))
			.count();
		assert_eq!(titles, 2);

		client.reload(URL_B).await.unwrap();
		assert_eq!(browser().params_of("S-T0", "Page.navigate").len(), 2);
		assert_eq!(launcher.launched().len(), 1);
	}

	#[tokio::test]
	async fn opened_client_comes_to_front() {
		let launcher = FakeLauncher::new(true);
		let mut client = DevToolsClient::new(manager(&launcher), ClientOptions::default());

		client.open(URL_A, "api").await.unwrap();
		client.bring_to_front().await.unwrap();

		assert_eq!(launcher.last().params_of("S-T0", "Page.bringToFront").len(), 1);
	}

	#[tokio::test]
	async fn destroyed_tab_invalidates_client() {
		let launcher = FakeLauncher::new(true);
		let mut client = DevToolsClient::new(manager(&launcher), ClientOptions::default());
		client.open(URL_A, "api").await.unwrap();
		let invalidation = client.invalidated();

		launcher.last().emit("Target.targetDestroyed", json!({ "targetId": "T0" }));

		let fired = tokio::time::timeout(Duration::from_secs(5), invalidation.wait()).await.unwrap();
		assert!(fired);
	}
}
