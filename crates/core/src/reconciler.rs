//! Keeps each process's debugger session in step with its inspector URL.
//!
//! Three timelines feed into this module: the process starting and stopping
//! its inspector, the operator closing the debugger tab, and the operator
//! asking for the debugger again. Every call classifies the session into a
//! [`SessionState`] and applies the one transition that state allows.

use std::sync::Arc;

use crate::error::Result;
use crate::process::Process;
use crate::registry::{Session, SessionRegistry, Slot};
use crate::signal::DebuggerStarter;
use crate::ui::UiFactory;

const TARGET: &str = "devtools.reconcile";

/// Where a process's session stands relative to the process's inspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	/// No session is registered for the process.
	NoSession,
	/// A session exists but was never bound to a URL.
	AwaitingStart,
	/// The session is bound to a URL the process no longer advertises.
	BoundStale,
	/// The session is bound to the process's current URL.
	BoundCurrent,
}

impl SessionState {
	/// Classifies a registered session from its bound URL and the process URL.
	pub fn classify(bound_url: Option<&str>, process_url: Option<&str>) -> Self {
		match bound_url {
			None => SessionState::AwaitingStart,
			Some(bound) if Some(bound) == process_url => SessionState::BoundCurrent,
			Some(_) => SessionState::BoundStale,
		}
	}
}

/// Options for [`Reconciler::launch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchOptions {
	/// Bring the debugger tab to the foreground once it is attached.
	pub activate_after_launch: bool,
}

impl LaunchOptions {
	pub fn activated() -> Self {
		Self {
			activate_after_launch: true,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
	/// Operator request; always acts.
	Launch,
	/// Periodic update; signals at most once per pid.
	Reconcile,
}

/// Drives sessions in a [`SessionRegistry`].
pub struct Reconciler {
	ui: Arc<dyn UiFactory>,
	starter: Arc<dyn DebuggerStarter>,
}

impl Reconciler {
	pub fn new(ui: Arc<dyn UiFactory>, starter: Arc<dyn DebuggerStarter>) -> Self {
		Self { ui, starter }
	}

	/// Registry key for `process`.
	pub fn session_key(process: &Process) -> &str {
		&process.name
	}

	/// Current state of `process`'s session, waiting for any operation on it.
	pub async fn state(registry: &SessionRegistry, process: &Process) -> SessionState {
		match registry.get(Self::session_key(process)) {
			None => SessionState::NoSession,
			Some(session) => {
				let bound_url = session.bound_url().await;
				SessionState::classify(bound_url.as_deref(), process.inspector_url())
			}
		}
	}

	/// Operator request to open the debugger for `process`.
	///
	/// Creates the session on first use. A call arriving while another
	/// operation holds the same session is dropped.
	pub async fn launch(&self, registry: &SessionRegistry, process: &Process, options: LaunchOptions) -> Result<()> {
		let key = Self::session_key(process);

		let Some(session) = registry.get(key) else {
			return self.create(registry, process, options).await;
		};
		let Some(mut slot) = session.try_lock_slot() else {
			tracing::debug!(target = TARGET, process = %key, "debugger operation already in flight");
			return Ok(());
		};
		self.advance(&mut slot, process, options, Trigger::Launch).await
	}

	/// Periodic update after `process` changed.
	///
	/// Never creates a session and never activates the tab.
	pub async fn reconcile(&self, registry: &SessionRegistry, process: &Process) -> Result<()> {
		let key = Self::session_key(process);

		let Some(session) = registry.get(key) else {
			return Ok(());
		};
		let Some(mut slot) = session.try_lock_slot() else {
			tracing::trace!(target = TARGET, process = %key, "session busy; update skipped");
			return Ok(());
		};
		self.advance(&mut slot, process, LaunchOptions::default(), Trigger::Reconcile)
			.await
	}

	async fn create(&self, registry: &SessionRegistry, process: &Process, options: LaunchOptions) -> Result<()> {
		let key = Self::session_key(process);
		let session = Arc::new(Session::new(key, self.ui.create()));

		// Locked and registered with no await in between, so concurrent calls
		// for the same key find the slot held. A fresh slot is uncontended.
		let Some(mut slot) = session.try_lock_slot() else {
			return Ok(());
		};
		if !registry.insert_new(Arc::clone(&session)) {
			tracing::debug!(target = TARGET, process = %key, "session created concurrently");
			return Ok(());
		}
		registry.watch_invalidation(&session, slot.ui.invalidated());

		let created = match process.inspector_url() {
			None => self.request_start(&mut slot, process),
			Some(url) => self.bind(&mut slot, process, url, options).await,
		};

		if let Err(e) = &created {
			registry.delete_if_current(key, session.id());
			tracing::debug!(target = TARGET, process = %key, error = %e, "session discarded");
		}
		created
	}

	async fn advance(
		&self,
		slot: &mut Slot,
		process: &Process,
		options: LaunchOptions,
		trigger: Trigger,
	) -> Result<()> {
		let process_url = process.inspector_url();
		let state = SessionState::classify(slot.bound_url.as_deref(), process_url);

		match (state, process_url) {
			(SessionState::BoundCurrent, _) => {
				if options.activate_after_launch {
					slot.ui.bring_to_front().await?;
				}
				Ok(())
			}
			(_, Some(url)) => self.bind(slot, process, url, options).await,
			(SessionState::BoundStale, None) => self.restart(slot, process, trigger),
			(_, None) => {
				tracing::trace!(target = TARGET, process = %process.name, "waiting for debugger to start");
				Ok(())
			}
		}
	}

	/// Points the UI at `url`, opening it if needed.
	async fn bind(&self, slot: &mut Slot, process: &Process, url: &str, options: LaunchOptions) -> Result<()> {
		if slot.ui.is_open() {
			slot.ui.reload(url).await?;
		} else {
			slot.ui.open(url, &process.name).await?;
		}
		slot.bound_url = Some(url.to_string());
		slot.signaled_pid = None;
		tracing::info!(target = TARGET, process = %process.name, %url, "debugger attached");

		if options.activate_after_launch {
			slot.ui.bring_to_front().await?;
		}
		Ok(())
	}

	/// The process dropped its inspector while a UI was bound.
	fn restart(&self, slot: &mut Slot, process: &Process, trigger: Trigger) -> Result<()> {
		if trigger == Trigger::Reconcile {
			let Some(pid) = process.pid() else {
				tracing::trace!(target = TARGET, process = %process.name, "no pid to signal");
				return Ok(());
			};
			if slot.signaled_pid == Some(pid) {
				return Ok(());
			}
		}
		tracing::info!(target = TARGET, process = %process.name, "inspector went away; restarting debugger");
		self.request_start(slot, process)
	}

	fn request_start(&self, slot: &mut Slot, process: &Process) -> Result<()> {
		self.starter.request_start(process)?;
		slot.signaled_pid = process.pid();
		Ok(())
	}
}

impl std::fmt::Debug for Reconciler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Reconciler").finish_non_exhaustive()
	}
}
