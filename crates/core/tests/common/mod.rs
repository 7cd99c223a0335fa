//! Scriptable stand-ins for the browser UI and the restart signal.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use devtools::{DebuggerStarter, Error, Invalidation, Invalidator, Process, Reconciler, Result, UiFactory, UiSession};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

pub const URL_ABC: &str = "ws://localhost:9229/abc";
pub const URL_DEF: &str = "ws://localhost:9229/def";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCall {
	Open { url: String, title: String },
	Reload(String),
	BringToFront,
}

/// Observation side of one [`FakeUi`].
#[derive(Default)]
pub struct UiProbe {
	calls: Mutex<Vec<UiCall>>,
	invalidator: Invalidator,
	opening: AtomicBool,
}

impl UiProbe {
	pub fn calls(&self) -> Vec<UiCall> {
		self.calls.lock().clone()
	}

	pub fn opens(&self) -> usize {
		self.count(|call| matches!(call, UiCall::Open { .. }))
	}

	pub fn reloads(&self) -> usize {
		self.count(|call| matches!(call, UiCall::Reload(_)))
	}

	pub fn fronts(&self) -> usize {
		self.count(|call| matches!(call, UiCall::BringToFront))
	}

	/// Simulates the operator closing the tab.
	pub fn close(&self) {
		self.invalidator.invalidate();
	}

	/// Whether an `open` call has started.
	pub fn is_opening(&self) -> bool {
		self.opening.load(Ordering::SeqCst)
	}

	fn count(&self, pred: impl Fn(&UiCall) -> bool) -> usize {
		self.calls.lock().iter().filter(|call| pred(call)).count()
	}

	fn record(&self, call: UiCall) {
		self.calls.lock().push(call);
	}
}

pub struct FakeUi {
	probe: Arc<UiProbe>,
	url: Option<String>,
	open: bool,
	fail_open: bool,
	gate: Option<Arc<Semaphore>>,
}

#[async_trait]
impl UiSession for FakeUi {
	async fn open(&mut self, inspector_url: &str, title: &str) -> Result<()> {
		if self.open {
			return self.reload(inspector_url).await;
		}
		self.probe.opening.store(true, Ordering::SeqCst);
		if let Some(gate) = &self.gate {
			if let Ok(permit) = gate.acquire().await {
				permit.forget();
			}
		}
		self.probe.record(UiCall::Open {
			url: inspector_url.to_string(),
			title: title.to_string(),
		});
		if self.fail_open {
			return Err(Error::Navigation {
				url: inspector_url.to_string(),
				reason: "net::ERR_CONNECTION_REFUSED".to_string(),
			});
		}
		self.open = true;
		self.url = Some(inspector_url.to_string());
		Ok(())
	}

	async fn reload(&mut self, inspector_url: &str) -> Result<()> {
		if self.url.as_deref() == Some(inspector_url) {
			return Ok(());
		}
		self.url = Some(inspector_url.to_string());
		if self.open {
			self.probe.record(UiCall::Reload(inspector_url.to_string()));
		}
		Ok(())
	}

	async fn bring_to_front(&self) -> Result<()> {
		if !self.open {
			return Err(Error::NotLaunched);
		}
		self.probe.record(UiCall::BringToFront);
		Ok(())
	}

	fn is_open(&self) -> bool {
		self.open
	}

	fn invalidated(&self) -> Invalidation {
		self.probe.invalidator.subscribe()
	}
}

/// Hands out [`FakeUi`]s and keeps their probes.
#[derive(Default)]
pub struct FakeFactory {
	created: Mutex<Vec<Arc<UiProbe>>>,
	fail_open: AtomicBool,
	gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeFactory {
	pub fn created(&self) -> Vec<Arc<UiProbe>> {
		self.created.lock().clone()
	}

	pub fn last(&self) -> Arc<UiProbe> {
		self.created.lock().last().cloned().expect("no UI created yet")
	}

	pub fn total_opens(&self) -> usize {
		self.created.lock().iter().map(|probe| probe.opens()).sum()
	}

	/// Makes every subsequently created UI fail to open.
	pub fn fail_opens(&self, fail: bool) {
		self.fail_open.store(fail, Ordering::SeqCst);
	}

	/// Makes subsequently created UIs block in `open` until a permit is added.
	pub fn gate_opens(&self) -> Arc<Semaphore> {
		let gate = Arc::new(Semaphore::new(0));
		*self.gate.lock() = Some(Arc::clone(&gate));
		gate
	}
}

impl UiFactory for FakeFactory {
	fn create(&self) -> Box<dyn UiSession> {
		let probe = Arc::new(UiProbe::default());
		self.created.lock().push(Arc::clone(&probe));
		Box::new(FakeUi {
			probe,
			url: None,
			open: false,
			fail_open: self.fail_open.load(Ordering::SeqCst),
			gate: self.gate.lock().clone(),
		})
	}
}

/// Records restart requests instead of signalling.
#[derive(Default)]
pub struct FakeStarter {
	requests: Mutex<Vec<String>>,
	fail: AtomicBool,
}

impl FakeStarter {
	pub fn count(&self) -> usize {
		self.requests.lock().len()
	}

	pub fn requests(&self) -> Vec<String> {
		self.requests.lock().clone()
	}

	pub fn fail(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}
}

impl DebuggerStarter for FakeStarter {
	fn request_start(&self, process: &Process) -> Result<()> {
		if self.fail.load(Ordering::SeqCst) {
			return Err(Error::Signal {
				pid: process.pid().unwrap_or_default(),
				source: std::io::Error::from_raw_os_error(3),
			});
		}
		self.requests.lock().push(process.name.clone());
		Ok(())
	}
}

pub struct Harness {
	pub ui: Arc<FakeFactory>,
	pub starter: Arc<FakeStarter>,
	pub reconciler: Arc<Reconciler>,
}

impl Harness {
	pub fn new() -> Self {
		let ui = Arc::new(FakeFactory::default());
		let starter = Arc::new(FakeStarter::default());
		let reconciler = Arc::new(Reconciler::new(
			Arc::clone(&ui) as Arc<dyn UiFactory>,
			Arc::clone(&starter) as Arc<dyn DebuggerStarter>,
		));
		Self { ui, starter, reconciler }
	}
}

pub fn process(name: &str, pid: u32, url: Option<&str>) -> Process {
	Process::new(name).with_pid(pid).with_inspector_url(url)
}

/// Yields until `cond` holds, failing after a second.
pub async fn eventually(cond: impl Fn() -> bool) {
	let settled = tokio::time::timeout(Duration::from_secs(1), async {
		while !cond() {
			tokio::task::yield_now().await;
		}
	})
	.await;
	assert!(settled.is_ok(), "condition not reached in time");
}
