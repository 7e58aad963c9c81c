//! `--status` and `--stop`: one-shot requests to a running relay.

use anyhow::{Result, anyhow, bail};
use colored::Colorize;
use relay::{ControlRequest, ControlResponse, Error, RetryPolicy, ServerConfig, control};

pub async fn status(config: &ServerConfig) -> Result<()> {
	match send(config, &ControlRequest::Status).await? {
		ControlResponse::Status { clients, addr } => {
			let addr = addr.unwrap_or_else(|| "no transport listener".to_string());
			println!(
				"{} on {addr}, {clients} browser client{}",
				"Relay running".green().bold(),
				if clients == 1 { "" } else { "s" }
			);
			Ok(())
		}
		other => bail!("Unexpected reply to status request: {other:?}"),
	}
}

pub async fn stop(config: &ServerConfig) -> Result<()> {
	match send(config, &ControlRequest::Shutdown).await? {
		ControlResponse::Ok => {
			println!("{}", "Relay stopping".green().bold());
			Ok(())
		}
		other => bail!("Unexpected reply to stop request: {other:?}"),
	}
}

async fn send(config: &ServerConfig, request: &ControlRequest) -> Result<ControlResponse> {
	match control::request(&config.control, request, RetryPolicy::once()).await {
		Ok(ControlResponse::Error { message }) => Err(anyhow!("Relay rejected request: {message}")),
		Ok(response) => Ok(response),
		Err(Error::ControlUnavailable { .. }) => {
			bail!("No relay is running on port {} (control endpoint {})", config.port, config.control)
		}
		Err(err) => Err(err.into()),
	}
}
