#[cfg(test)]
mod tests;

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use relay::{ClientConfig, DEFAULT_HOST, DEFAULT_PORT, ServerConfig, is_url};

use crate::styles::cli_styles;

const EXAMPLES: &str = "\
Examples:
  Host A: start the relay      browser-relay
  Host B: connect a client     browser-relay --client --host <host A>
  Host A: open a URL           browser-relay https://www.example.com";

/// Root CLI for browser-relay.
#[derive(Parser, Debug)]
#[command(name = "browser-relay")]
#[command(about = "Open URLs from remote shells in a browser on another machine")]
#[command(version)]
#[command(styles = cli_styles())]
#[command(disable_help_flag = true)]
#[command(after_help = EXAMPLES)]
pub struct Cli {
	/// URL to open in every connected browser client
	#[arg(value_name = "URL")]
	pub url: Option<String>,

	/// Run in client mode (the side that actually opens the browser)
	#[arg(short, long, conflicts_with = "url")]
	pub client: bool,

	/// Hostname to run the relay on / connect to
	#[arg(short = 'h', long, env = "BROWSER_RELAY_HOST", default_value = DEFAULT_HOST)]
	pub host: String,

	/// Port to listen on / connect to
	#[arg(short, long, env = "BROWSER_RELAY_PORT", default_value_t = DEFAULT_PORT)]
	pub port: u16,

	/// Application used to open URLs in client mode (default: system browser)
	#[arg(short, long, env = "BROWSER_RELAY_APP", value_name = "APP")]
	pub app: Option<String>,

	/// Print the BROWSER environment hint and exit
	#[arg(long)]
	pub rc: bool,

	/// Report whether a relay is running and how many clients it has
	#[arg(long, conflicts_with_all = ["client", "url", "stop"])]
	pub status: bool,

	/// Ask a running relay to shut down
	#[arg(long, conflicts_with_all = ["client", "url"])]
	pub stop: bool,

	/// Control socket path (default: derived from the port)
	#[cfg(unix)]
	#[arg(long, value_name = "PATH")]
	pub socket: Option<PathBuf>,

	/// Log file for a relay started in the background
	#[arg(long, value_name = "PATH")]
	pub log_file: Option<PathBuf>,

	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = ArgAction::Count)]
	pub verbose: u8,

	/// Print help
	#[arg(long, action = ArgAction::Help)]
	help: Option<bool>,
}

/// What this invocation should do, resolved from the flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
	Rc,
	Status,
	Stop,
	Client,
	/// Hand a URL to the relay, starting it if needed.
	Open(String),
	/// Run the relay in the foreground.
	Serve,
}

impl Cli {
	pub fn mode(&self) -> Mode {
		if self.rc {
			return Mode::Rc;
		}
		if self.status {
			return Mode::Status;
		}
		if self.stop {
			return Mode::Stop;
		}
		if self.client {
			return Mode::Client;
		}
		match &self.url {
			Some(url) if is_url(url) => Mode::Open(url.clone()),
			_ => Mode::Serve,
		}
	}

	pub fn server_config(&self) -> ServerConfig {
		let mut config = ServerConfig::new(self.host.clone(), self.port);
		#[cfg(unix)]
		if let Some(socket) = &self.socket {
			config = config.with_control(relay::ControlAddr::Socket(socket.clone()));
		}
		if let Some(log_file) = &self.log_file {
			config = config.with_log_path(log_file.clone());
		}
		config
	}

	pub fn client_config(&self) -> ClientConfig {
		ClientConfig::new(self.host.clone(), self.port).with_app(self.app.clone())
	}

	/// Arguments that start this program as a relay for the same endpoint.
	pub fn serve_args(&self) -> Vec<String> {
		let mut args = vec![
			"-v".to_string(),
			"--host".to_string(),
			self.host.clone(),
			"--port".to_string(),
			self.port.to_string(),
		];
		#[cfg(unix)]
		if let Some(socket) = &self.socket {
			args.push("--socket".to_string());
			args.push(socket.display().to_string());
		}
		args
	}
}
