//! Process-name keyed registry of debugger sessions.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::{Mutex as TokioMutex, MutexGuard};

use crate::ui::{Invalidation, UiSession};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one [`Session`] instance.
///
/// Two sessions registered under the same key over time never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

/// One active or pending debugger attachment for one process.
pub struct Session {
	id: SessionId,
	key: String,
	slot: TokioMutex<Slot>,
}

/// Mutable part of a [`Session`]; held for the duration of any UI operation.
pub(crate) struct Slot {
	/// URL last passed to the UI, `None` until the first successful open.
	pub(crate) bound_url: Option<String>,
	pub(crate) ui: Box<dyn UiSession>,
	/// Pid the debugger-start signal was last sent to while waiting for a URL.
	pub(crate) signaled_pid: Option<u32>,
}

impl Session {
	pub(crate) fn new(key: impl Into<String>, ui: Box<dyn UiSession>) -> Self {
		Self {
			id: SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)),
			key: key.into(),
			slot: TokioMutex::new(Slot {
				bound_url: None,
				ui,
				signaled_pid: None,
			}),
		}
	}

	pub fn id(&self) -> SessionId {
		self.id
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	/// The URL the UI currently shows, waiting for any in-flight operation.
	pub async fn bound_url(&self) -> Option<String> {
		self.slot.lock().await.bound_url.clone()
	}

	/// Whether the UI has been opened, waiting for any in-flight operation.
	pub async fn has_ui(&self) -> bool {
		self.slot.lock().await.ui.is_open()
	}

	/// Returns `None` while another operation holds the session.
	pub(crate) fn try_lock_slot(&self) -> Option<MutexGuard<'_, Slot>> {
		self.slot.try_lock().ok()
	}
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session").field("id", &self.id).field("key", &self.key).finish()
	}
}

/// Mapping from process key to at most one [`Session`].
///
/// Cheap to clone; clones share the same map.
#[derive(Clone, Default)]
pub struct SessionRegistry {
	sessions: Arc<Mutex<HashMap<String, Arc<Session>>>>,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, key: &str) -> Option<Arc<Session>> {
		self.sessions.lock().get(key).cloned()
	}

	/// Registers `session` under its key, returning whatever it replaced.
	pub fn put(&self, session: Arc<Session>) -> Option<Arc<Session>> {
		self.sessions.lock().insert(session.key().to_string(), session)
	}

	/// Registers `session` unless its key is already taken.
	pub fn insert_new(&self, session: Arc<Session>) -> bool {
		match self.sessions.lock().entry(session.key().to_string()) {
			Entry::Occupied(_) => false,
			Entry::Vacant(vacant) => {
				vacant.insert(session);
				true
			}
		}
	}

	pub fn delete(&self, key: &str) -> Option<Arc<Session>> {
		self.sessions.lock().remove(key)
	}

	/// Removes the entry for `key` only if it is still the session `id`.
	pub fn delete_if_current(&self, key: &str, id: SessionId) -> bool {
		let mut sessions = self.sessions.lock();
		match sessions.get(key) {
			Some(current) if current.id() == id => {
				sessions.remove(key);
				true
			}
			_ => false,
		}
	}

	pub fn contains(&self, key: &str) -> bool {
		self.sessions.lock().contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.sessions.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.lock().is_empty()
	}

	/// Removes `session` once its UI reports invalidation.
	///
	/// Must be called when the session is created; the removal is
	/// identity-checked so a replacement registered in the meantime survives.
	pub fn watch_invalidation(&self, session: &Session, invalidation: Invalidation) {
		let registry = self.clone();
		let key = session.key().to_string();
		let id = session.id();

		tokio::spawn(async move {
			if !invalidation.wait().await {
				return;
			}
			if registry.delete_if_current(&key, id) {
				tracing::debug!(target = "devtools.registry", session = %key, "debugger closed; session removed");
			} else {
				tracing::debug!(target = "devtools.registry", session = %key, "stale invalidation ignored");
			}
		});
	}
}

impl std::fmt::Debug for SessionRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let sessions = self.sessions.lock();
		f.debug_set().entries(sessions.keys()).finish()
	}
}
