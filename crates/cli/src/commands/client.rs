use anyhow::{Context, Result};
use relay::{BrowserClient, ClientConfig};
use tracing::info;

pub async fn run(config: ClientConfig) -> Result<()> {
	let target = format!("{}:{}", config.host, config.port);
	let client = BrowserClient::new(config);

	tokio::select! {
		result = client.up() => result.with_context(|| format!("Browser client for {target} failed"))?,
		_ = tokio::signal::ctrl_c() => info!(target = "relay.cli", "interrupted, disconnecting"),
	}
	Ok(())
}
