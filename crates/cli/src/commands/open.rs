use anyhow::{Context, Result};
use colored::Colorize;
use relay::{DetachedProcess, Launcher};

use crate::cli::Cli;

pub async fn run(cli: &Cli, url: &str) -> Result<()> {
	let config = cli.server_config();
	let spawner = DetachedProcess::current_exe()
		.context("Failed to locate own executable")?
		.args(cli.serve_args());

	let delivery = Launcher::new(config, spawner)
		.deliver(url)
		.await
		.context("Failed to hand the URL to the relay")?;

	if delivery.spawned {
		eprintln!("{}", "Relay was not running, started it in the background.".bright_red());
	}
	if delivery.clients == 0 {
		eprintln!(
			"{}",
			"No browser clients are connected; the URL was not opened anywhere.".yellow()
		);
	}
	Ok(())
}
