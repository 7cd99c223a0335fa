//! Event plumbing for [`Page`](super::Page): close detection and waiting on
//! session-scoped events.

use std::time::Duration;

use devtools_runtime::Event;
use tokio::sync::{broadcast, watch};

use super::Page;
use crate::error::{Error, Result};

/// Whether `event` reports the end of the tab identified by the ids.
pub(super) fn is_close_event(event: &Event, target_id: &str, session_id: &str) -> bool {
	let param = |name: &str| event.params.get(name).and_then(|v| v.as_str());
	match event.method.as_str() {
		"Target.targetDestroyed" | "Target.targetCrashed" => param("targetId") == Some(target_id),
		"Target.detachedFromTarget" => param("sessionId") == Some(session_id),
		"Inspector.detached" => event.is_from(session_id),
		_ => false,
	}
}

/// Spawns a task that flips the returned watch when the tab goes away.
///
/// The task ends early once every receiver has been dropped.
pub(super) fn spawn_close_monitor(
	mut events: broadcast::Receiver<Event>,
	mut connection_closed: watch::Receiver<bool>,
	target_id: String,
	session_id: String,
) -> watch::Receiver<bool> {
	let (tx, rx) = watch::channel(false);

	tokio::spawn(async move {
		loop {
			tokio::select! {
				event = events.recv() => match event {
					Ok(event) if is_close_event(&event, &target_id, &session_id) => {
						tracing::debug!(target = "devtools.page", %target_id, method = %event.method, "tab closed");
						break;
					}
					Ok(_) => {}
					Err(broadcast::error::RecvError::Lagged(n)) => {
						tracing::warn!(target = "devtools.page", dropped = n, "close monitor lagged");
					}
					Err(broadcast::error::RecvError::Closed) => break,
				},
				_ = connection_closed.wait_for(|closed| *closed) => {
					tracing::debug!(target = "devtools.page", %target_id, "browser connection closed");
					break;
				}
				_ = tx.closed() => return,
			}
		}
		tx.send_replace(true);
	});

	rx
}

impl Page {
	/// Waits for the next `method` event from this tab's session.
	pub(super) async fn wait_for_event(
		&self,
		events: &mut broadcast::Receiver<Event>,
		method: &str,
		timeout: Duration,
	) -> Result<Event> {
		let mut closed = self.on_close();

		let wait = async {
			loop {
				tokio::select! {
					event = events.recv() => match event {
						Ok(event) if event.method == method && event.is_from(self.session_id()) => {
							return Ok::<_, Error>(event);
						}
						Ok(_) => {}
						Err(broadcast::error::RecvError::Lagged(n)) => {
							tracing::warn!(target = "devtools.page", dropped = n, method, "event receiver lagged");
						}
						Err(broadcast::error::RecvError::Closed) => {
							return Err(Error::from(devtools_runtime::Error::ChannelClosed));
						}
					},
					_ = closed.wait_for(|closed| *closed) => {
						return Err(Error::from(devtools_runtime::Error::TargetClosed(
							self.target_id().to_string(),
						)));
					}
				}
			}
		};

		tokio::time::timeout(timeout, wait)
			.await
			.map_err(|_| devtools_runtime::Error::Timeout(format!("waiting for {method}")))?
	}
}
