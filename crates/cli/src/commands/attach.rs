//! `devtools-attach attach`: a one-process supervisor.
//!
//! Polls the inspector's HTTP endpoint and feeds the resulting process
//! snapshots to the plugin, exactly as a supervisor would.

use std::time::Duration;

use devtools::{DebuggerPlugin, Process, process_alive};
use tokio::time::MissedTickBehavior;

use crate::cli::AttachArgs;
use crate::error::{CliError, Result};
use crate::inspector::InspectorProbe;

const MIN_POLL: Duration = Duration::from_millis(100);

fn snapshot(args: &AttachArgs, inspector_url: Option<&str>) -> Process {
	Process::new(&args.name)
		.with_pid(args.pid)
		.with_inspector_url(inspector_url)
}

pub async fn execute(plugin: &DebuggerPlugin, args: AttachArgs) -> Result<()> {
	let probe = InspectorProbe::new(&args.inspector)?;

	let process = snapshot(&args, probe.current_url().await.as_deref());
	for (key, command) in plugin.commands(&process) {
		tracing::info!(process = %args.name, key = %key, verb = command.verb(), "running command");
		command.toggle().await;
	}
	if !plugin.registry().contains(&args.name) {
		return Err(CliError::LaunchFailed { name: args.name });
	}

	let mut interval = tokio::time::interval(Duration::from_millis(args.poll_ms).max(MIN_POLL));
	interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
	let shutdown = tokio::signal::ctrl_c();
	tokio::pin!(shutdown);

	loop {
		tokio::select! {
			_ = &mut shutdown => {
				tracing::info!("interrupted");
				break;
			}
			_ = interval.tick() => {
				if !process_alive(args.pid) {
					tracing::info!(pid = args.pid, "process exited");
					break;
				}
				let process = snapshot(&args, probe.current_url().await.as_deref());
				plugin.update(&process).await;

				if !plugin.registry().contains(&args.name) {
					tracing::info!(process = %args.name, "debugger closed");
					break;
				}
			}
		}
	}

	Ok(())
}
