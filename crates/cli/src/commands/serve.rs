use anyhow::{Context, Result};
use colored::Colorize;
use relay::{RelayServer, ServerConfig};
use tracing::info;

use crate::notice;

pub async fn run(config: ServerConfig) -> Result<()> {
	// Installed first so an interrupt during startup still reaches `down()`.
	let mut stop = StopSignals::install()?;

	let relay = RelayServer::new(config);
	relay.up().await.context("Failed to start relay")?;

	match relay.local_addr() {
		Some(addr) => println!("{} {addr}", "Relay listening on".green().bold()),
		None => println!("{}", "Relay running without a transport listener".yellow()),
	}
	notice::print_if_unconfigured();

	stop.wait(&relay).await;
	relay.down().await;
	Ok(())
}

#[cfg(unix)]
struct StopSignals {
	sigterm: tokio::signal::unix::Signal,
	sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl StopSignals {
	fn install() -> Result<Self> {
		use tokio::signal::unix::{SignalKind, signal};

		Ok(Self {
			sigterm: signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?,
			sigint: signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?,
		})
	}

	async fn wait(&mut self, relay: &RelayServer) {
		tokio::select! {
			_ = self.sigterm.recv() => info!(target = "relay.cli", "received SIGTERM, shutting down"),
			_ = self.sigint.recv() => info!(target = "relay.cli", "received SIGINT, shutting down"),
			_ = relay.shutdown_requested() => info!(target = "relay.cli", "shutdown requested via control channel"),
		}
	}
}

#[cfg(not(unix))]
struct StopSignals;

#[cfg(not(unix))]
impl StopSignals {
	fn install() -> Result<Self> {
		Ok(Self)
	}

	async fn wait(&mut self, relay: &RelayServer) {
		tokio::select! {
			result = tokio::signal::ctrl_c() => match result {
				Ok(()) => info!(target = "relay.cli", "received Ctrl+C, shutting down"),
				Err(err) => tracing::warn!(target = "relay.cli", error = %err, "Ctrl+C handler failed, shutting down"),
			},
			_ = relay.shutdown_requested() => info!(target = "relay.cli", "shutdown requested via control channel"),
		}
	}
}
