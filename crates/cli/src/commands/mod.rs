pub mod attach;
pub mod watch;

use devtools::DebuggerPlugin;

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let config = Config::load(cli.config.as_deref())?.merge_cli(&cli);
	let plugin = DebuggerPlugin::with_devtools(
		config.browser_options(),
		config.client_options(),
		config.plugin_options(),
	);

	match cli.command {
		Commands::Attach(args) => attach::execute(&plugin, args).await,
		Commands::Watch(args) => watch::execute(&plugin, args).await,
	}
}
