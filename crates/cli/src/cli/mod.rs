
use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Args, Parser, Subcommand};

/// Inspector address Node uses when started with a bare `--inspect`.
pub const DEFAULT_INSPECTOR: &str = "127.0.0.1:9229";

/// Keep a Chromium DevTools tab attached to a process's V8 inspector.
#[derive(Parser, Debug)]
#[command(name = "devtools-attach")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Config file [default: <config dir>/devtools-attach/config.json]
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Chromium executable to launch
	#[arg(long, global = true, value_name = "PATH")]
	pub chrome: Option<PathBuf>,

	/// Launch the browser without a window
	#[arg(long, global = true)]
	pub headless: bool,

	/// Key bound to the launch command
	#[arg(long, global = true, value_name = "KEY")]
	pub key: Option<String>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Attach to one running process and follow its inspector.
	Attach(AttachArgs),
	/// Read supervisor events as NDJSON from stdin.
	Watch(WatchArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AttachArgs {
	/// Name shown as the debugger tab title.
	#[arg(value_name = "NAME")]
	pub name: String,

	/// Pid of the process; signalled to (re)start its inspector.
	#[arg(long)]
	pub pid: u32,

	/// Inspector HTTP endpoint polled for the WebSocket URL.
	#[arg(long, value_name = "HOST:PORT", default_value = DEFAULT_INSPECTOR)]
	pub inspector: String,

	/// Poll interval in milliseconds.
	#[arg(long, value_name = "MS", default_value_t = 1000)]
	pub poll_ms: u64,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WatchArgs {
	/// Exit at end of input instead of waiting for open debuggers to close.
	#[arg(long)]
	pub no_wait: bool,
}

fn cli_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
}
