//! `devtools-attach watch`: supervisor events over stdin.
//!
//! Each line is one JSON object:
//!
//! ```text
//! {"event":"update","process":{"name":"api","child":{"pid":42,"inspectorUrl":"ws://..."}}}
//! {"event":"command","key":"d","process":{"name":"api","child":{"pid":42}}}
//! ```
//!
//! Each process gets its own queue: events for one process apply in input
//! order, while a slow launch for one process does not hold up another's.

use std::collections::HashMap;
use std::time::Duration;

use devtools::{DebuggerPlugin, Process};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::cli::WatchArgs;
use crate::error::Result;

const DRAIN_POLL: Duration = Duration::from_millis(200);

/// One line of supervisor input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum SupervisorEvent {
	/// A process record changed.
	Update { process: Process },
	/// The operator pressed `key` with `process` selected.
	Command { key: String, process: Process },
}

impl SupervisorEvent {
	pub fn process(&self) -> &Process {
		match self {
			SupervisorEvent::Update { process } | SupervisorEvent::Command { process, .. } => process,
		}
	}
}

pub fn parse_event(line: &str) -> serde_json::Result<SupervisorEvent> {
	serde_json::from_str(line)
}

pub async fn execute(plugin: &DebuggerPlugin, args: WatchArgs) -> Result<()> {
	let shutdown = tokio::signal::ctrl_c();
	tokio::pin!(shutdown);

	tokio::select! {
		_ = &mut shutdown => {
			tracing::info!("interrupted");
			return Ok(());
		}
		consumed = consume(plugin, BufReader::new(tokio::io::stdin())) => consumed?,
	}

	if args.no_wait {
		return Ok(());
	}

	tracing::info!(sessions = plugin.registry().len(), "input closed; waiting for debuggers to close");
	loop {
		if plugin.registry().is_empty() {
			return Ok(());
		}
		tokio::select! {
			_ = &mut shutdown => {
				tracing::info!("interrupted");
				return Ok(());
			}
			_ = tokio::time::sleep(DRAIN_POLL) => {}
		}
	}
}

/// Dispatches every event in `reader`, returning once all of them finished.
pub async fn consume<R>(plugin: &DebuggerPlugin, reader: R) -> Result<()>
where
	R: AsyncBufRead + Unpin,
{
	let mut lines = reader.lines();
	let mut queues: HashMap<String, mpsc::UnboundedSender<SupervisorEvent>> = HashMap::new();
	let mut workers = JoinSet::new();
	let mut line_no = 0usize;

	while let Some(line) = lines.next_line().await? {
		line_no += 1;
		let line = line.trim();
		if line.is_empty() {
			continue;
		}

		let event = match parse_event(line) {
			Ok(event) => event,
			Err(e) => {
				tracing::warn!(line = line_no, error = %e, "skipping malformed event");
				continue;
			}
		};

		let queue = queues.entry(event.process().name.clone()).or_insert_with(|| {
			let (tx, rx) = mpsc::unbounded_channel();
			workers.spawn(drain_queue(plugin.clone(), rx));
			tx
		});
		if queue.send(event).is_err() {
			tracing::error!(line = line_no, "event queue closed; event dropped");
		}

		while let Some(joined) = workers.try_join_next() {
			log_join(joined);
		}
	}

	drop(queues);
	while let Some(joined) = workers.join_next().await {
		log_join(joined);
	}
	Ok(())
}

/// Applies one process's events in order.
async fn drain_queue(plugin: DebuggerPlugin, mut events: mpsc::UnboundedReceiver<SupervisorEvent>) {
	while let Some(event) = events.recv().await {
		handle(&plugin, event).await;
	}
}

async fn handle(plugin: &DebuggerPlugin, event: SupervisorEvent) {
	match event {
		SupervisorEvent::Update { process } => plugin.update(&process).await,
		SupervisorEvent::Command { key, process } => {
			let command = plugin
				.commands(&process)
				.into_iter()
				.find_map(|(bound, command)| (bound == key).then_some(command));
			match command {
				Some(command) => command.toggle().await,
				None => tracing::debug!(process = %process.name, %key, "no command bound to key"),
			}
		}
	}
}

fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
	if let Err(e) = joined {
		tracing::error!(error = %e, "event task failed");
	}
}
