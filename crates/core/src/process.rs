//! The supervisor's view of a process, as consumed by the reconciler.

use serde::{Deserialize, Serialize};

/// A supervised process.
///
/// Owned by the supervisor and read-only here. Identity is the `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
	pub name: String,
	/// Present only when the process is instrumented.
	#[serde(default)]
	pub child: Option<ChildProcess>,
}

/// The instrumented OS process behind a [`Process`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildProcess {
	#[serde(default)]
	pub pid: Option<u32>,
	/// Set once the process has started its inspector; may change when the
	/// inspector is stopped and started again.
	#[serde(default)]
	pub inspector_url: Option<String>,
}

impl Process {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			child: None,
		}
	}

	/// Attaches a child with the given pid and no inspector.
	pub fn with_pid(mut self, pid: u32) -> Self {
		self.child.get_or_insert_with(ChildProcess::default).pid = Some(pid);
		self
	}

	/// Sets (or clears) the child's inspector URL.
	pub fn with_inspector_url(mut self, url: Option<&str>) -> Self {
		self.child.get_or_insert_with(ChildProcess::default).inspector_url = url.map(str::to_string);
		self
	}

	pub fn pid(&self) -> Option<u32> {
		self.child.as_ref().and_then(|child| child.pid)
	}

	/// The inspector URL, treating an empty string as absent.
	pub fn inspector_url(&self) -> Option<&str> {
		self.child
			.as_ref()
			.and_then(|child| child.inspector_url.as_deref())
			.filter(|url| !url.is_empty())
	}

	/// Whether the process is instrumented at all (has a child pid).
	pub fn is_debuggable(&self) -> bool {
		self.pid().is_some()
	}
}
