//! [`Page`]: one attached browser tab.

mod input;
mod page_events;

use std::sync::Arc;
use std::time::Duration;

use devtools_runtime::Connection;
use serde_json::{Value, json};
use tokio::sync::watch;

pub use input::{Keyboard, Modifier};

use crate::error::{Error, Result};

/// Interval between visibility probes in [`Page::wait_for_selector`].
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A browser tab attached over a flattened CDP session.
///
/// Cheap to clone; clones address the same tab.
#[derive(Clone)]
pub struct Page {
	connection: Arc<Connection>,
	target_id: Arc<str>,
	session_id: Arc<str>,
	/// Flips to `true` once the tab or its browser is gone.
	closed: watch::Receiver<bool>,
}

impl Page {
	/// Attaches to `target_id` and enables page-domain events.
	pub async fn attach(connection: Arc<Connection>, target_id: &str) -> Result<Self> {
		// Subscribe before attaching so a destroy racing the attach is seen.
		let events = connection.subscribe();

		let attached = connection
			.send(
				None,
				"Target.attachToTarget",
				json!({ "targetId": target_id, "flatten": true }),
			)
			.await?;
		let session_id = attached
			.get("sessionId")
			.and_then(Value::as_str)
			.ok_or_else(|| {
				devtools_runtime::Error::ProtocolError("attachToTarget returned no sessionId".to_string())
			})?
			.to_string();

		let closed = page_events::spawn_close_monitor(
			events,
			connection.closed(),
			target_id.to_string(),
			session_id.clone(),
		);

		let page = Self {
			connection,
			target_id: target_id.into(),
			session_id: session_id.into(),
			closed,
		};
		page.send("Page.enable", json!({})).await?;

		tracing::debug!(target = "devtools.page", target_id, "attached to tab");
		Ok(page)
	}

	pub fn target_id(&self) -> &str {
		&self.target_id
	}

	pub fn session_id(&self) -> &str {
		&self.session_id
	}

	/// Sends a command scoped to this tab's session.
	pub(crate) async fn send(&self, method: &str, params: Value) -> Result<Value> {
		Ok(self.connection.send(Some(&self.session_id), method, params).await?)
	}

	/// Navigates to `url` and waits for its load event.
	pub async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
		let mut events = self.connection.subscribe();

		let navigated = self.send("Page.navigate", json!({ "url": url })).await?;
		if let Some(reason) = navigated.get("errorText").and_then(Value::as_str) {
			return Err(Error::Navigation {
				url: url.to_string(),
				reason: reason.to_string(),
			});
		}

		self.wait_for_event(&mut events, "Page.loadEventFired", timeout).await?;
		tracing::debug!(target = "devtools.page", url, "navigation finished");
		Ok(())
	}

	/// Evaluates `expression` in the tab and returns its JSON value.
	///
	/// Promises are awaited. A thrown exception becomes [`Error::Evaluation`].
	pub async fn evaluate(&self, expression: &str) -> Result<Value> {
		let evaluated = self
			.send(
				"Runtime.evaluate",
				json!({
					"expression": expression,
					"returnByValue": true,
					"awaitPromise": true,
				}),
			)
			.await?;

		if let Some(details) = evaluated.get("exceptionDetails") {
			let description = details
				.pointer("/exception/description")
				.or_else(|| details.get("text"))
				.and_then(Value::as_str)
				.unwrap_or("uncaught exception");
			return Err(Error::Evaluation(description.to_string()));
		}

		Ok(evaluated.pointer("/result/value").cloned().unwrap_or(Value::Null))
	}

	pub async fn set_title(&self, title: &str) -> Result<()> {
		let expression = format!("document.title = {}", serde_json::to_string(title)?);
		self.evaluate(&expression).await?;
		Ok(())
	}

	/// Activates the tab and raises its window.
	pub async fn bring_to_front(&self) -> Result<()> {
		self.send("Page.bringToFront", json!({})).await?;
		Ok(())
	}

	pub fn keyboard(&self) -> Keyboard {
		Keyboard::new(self.clone())
	}

	/// Polls until an element matching `selector` is visible.
	///
	/// # Errors
	///
	/// [`Error::StartupTimeout`] once `timeout` elapses, or the underlying
	/// error if the tab goes away while waiting.
	pub async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
		let expression = visibility_probe(selector)?;
		let deadline = tokio::time::Instant::now() + timeout;

		loop {
			match self.evaluate(&expression).await {
				Ok(Value::Bool(true)) => return Ok(()),
				Ok(_) => {}
				Err(e) if e.is_target_closed() => return Err(e),
				// The front-end may still be replacing its document.
				Err(e) => tracing::trace!(target = "devtools.page", selector, error = %e, "selector probe failed"),
			}

			if tokio::time::Instant::now() + SELECTOR_POLL_INTERVAL > deadline {
				return Err(Error::StartupTimeout {
					selector: selector.to_string(),
					timeout_ms: timeout.as_millis() as u64,
				});
			}
			tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
		}
	}

	/// Returns a watch that flips to `true` once the tab is gone.
	pub fn on_close(&self) -> watch::Receiver<bool> {
		self.closed.clone()
	}

	pub fn is_closed(&self) -> bool {
		*self.closed.borrow()
	}
}

impl std::fmt::Debug for Page {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Page")
			.field("target_id", &self.target_id)
			.field("session_id", &self.session_id)
			.field("closed", &self.is_closed())
			.finish()
	}
}

/// Script returning whether `selector` matches a rendered, non-hidden element.
fn visibility_probe(selector: &str) -> Result<String> {
	let selector = serde_json::to_string(selector)?;
	Ok(format!(
		"(() => {{ \
			const el = document.querySelector({selector}); \
			if (!el) return false; \
			const rect = el.getBoundingClientRect(); \
			return getComputedStyle(el).visibility !== 'hidden' && rect.width > 0 && rect.height > 0; \
		}})()"
	))
}
