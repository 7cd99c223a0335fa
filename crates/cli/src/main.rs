use clap::Parser;
use devtools_cli::{cli::Cli, commands, error::CliError, logging};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = commands::dispatch(cli).await {
		handle_error(err);
		std::process::exit(1);
	}
}

fn handle_error(err: CliError) {
	tracing::debug!(error = ?err, "command failed");
	eprintln!("error: {:#}", anyhow::Error::from(err));
}
