//! One handler per [`Mode`].

mod client;
mod control;
mod open;
mod serve;

use anyhow::Result;

use crate::cli::{Cli, Mode};
use crate::notice;

pub async fn run(cli: Cli) -> Result<()> {
	match cli.mode() {
		Mode::Rc => {
			println!("{}", notice::current_env_hint()?);
			Ok(())
		}
		Mode::Status => control::status(&cli.server_config()).await,
		Mode::Stop => control::stop(&cli.server_config()).await,
		Mode::Client => client::run(cli.client_config()).await,
		Mode::Open(url) => {
			open::run(&cli, &url).await?;
			notice::print_if_unconfigured();
			Ok(())
		}
		Mode::Serve => {
			if let Some(arg) = &cli.url {
				tracing::warn!(target = "relay.cli", arg = %arg, "argument is not an http(s) URL, starting the relay instead");
			}
			serve::run(cli.server_config()).await
		}
	}
}
