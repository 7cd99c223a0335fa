//! The debugger-UI capability the reconciler drives.
//!
//! A [`UiSession`] is one browser tab showing the DevTools front-end for one
//! inspector URL. It can be re-pointed, brought to the foreground, and
//! signals exactly once through its [`Invalidation`] when the tab (or the
//! browser hosting it) goes away.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::Result;

/// One debugger tab bound to one inspector URL.
#[async_trait]
pub trait UiSession: Send + Sync {
	/// Opens the UI on `inspector_url`.
	///
	/// A no-op if already showing that URL; re-points the tab if it shows a
	/// different one.
	async fn open(&mut self, inspector_url: &str, title: &str) -> Result<()>;

	/// Points an open UI at `inspector_url`, reloading the front-end.
	async fn reload(&mut self, inspector_url: &str) -> Result<()>;

	/// Activates the tab and its window.
	///
	/// Fails with [`Error::NotLaunched`](crate::Error::NotLaunched) before the
	/// first successful [`open`](Self::open).
	async fn bring_to_front(&self) -> Result<()>;

	/// Whether a tab has been acquired.
	fn is_open(&self) -> bool;

	/// Handle that resolves once the UI has been invalidated.
	fn invalidated(&self) -> Invalidation;
}

/// Creates fresh, unopened [`UiSession`]s.
pub trait UiFactory: Send + Sync {
	fn create(&self) -> Box<dyn UiSession>;
}

/// Fires the invalidation signal of a [`UiSession`].
///
/// Clones share the same signal; only the first call has an effect.
#[derive(Debug, Clone)]
pub struct Invalidator {
	tx: Arc<watch::Sender<bool>>,
}

impl Default for Invalidator {
	fn default() -> Self {
		Self::new()
	}
}

impl Invalidator {
	pub fn new() -> Self {
		let (tx, _) = watch::channel(false);
		Self { tx: Arc::new(tx) }
	}

	/// Marks the UI invalidated. Returns true on the first call only.
	pub fn invalidate(&self) -> bool {
		let was_invalidated = self.tx.send_replace(true);
		!was_invalidated
	}

	pub fn is_invalidated(&self) -> bool {
		*self.tx.borrow()
	}

	pub fn subscribe(&self) -> Invalidation {
		Invalidation { rx: self.tx.subscribe() }
	}
}

/// Receiving side of an [`Invalidator`].
#[derive(Debug, Clone)]
pub struct Invalidation {
	rx: watch::Receiver<bool>,
}

impl Invalidation {
	pub fn is_invalidated(&self) -> bool {
		*self.rx.borrow()
	}

	/// Waits for invalidation.
	///
	/// Returns `false` if every [`Invalidator`] was dropped without firing,
	/// meaning the UI was discarded rather than closed.
	pub async fn wait(mut self) -> bool {
		self.rx.wait_for(|invalidated| *invalidated).await.is_ok()
	}
}
