//! Endpoint configuration for the relay and the browser client.
//!
//! Both structs are immutable once handed to the component that uses them;
//! there is no process-wide state.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use crate::control::ControlAddr;
use crate::error::{Error, Result};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8000;

/// Where the relay listens and how local processes reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
	pub host: String,
	pub port: u16,
	/// Same-host control channel identity.
	pub control: ControlAddr,
	/// Output sink for a relay started in the background.
	pub log_path: PathBuf,
}

impl ServerConfig {
	/// Builds a config whose control channel and log sink are derived from `port`.
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: host.into(),
			port,
			control: ControlAddr::for_port(port),
			log_path: runtime_file(port, "log"),
		}
	}

	pub fn with_control(mut self, control: ControlAddr) -> Self {
		self.control = control;
		self
	}

	pub fn with_log_path(mut self, log_path: impl Into<PathBuf>) -> Self {
		self.log_path = log_path.into();
		self
	}

	/// Resolves the transport address the relay binds and the probe tests.
	pub fn resolve(&self) -> Result<SocketAddr> {
		resolve(&self.host, self.port)
	}
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self::new(DEFAULT_HOST, DEFAULT_PORT)
	}
}

/// Which relay a browser client connects to and how it opens URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
	pub host: String,
	pub port: u16,
	/// Browser application to prefer (for example `firefox`); system default when `None`.
	pub app: Option<String>,
}

impl ClientConfig {
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: host.into(),
			port,
			app: None,
		}
	}

	pub fn with_app(mut self, app: Option<String>) -> Self {
		self.app = app;
		self
	}
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self::new(DEFAULT_HOST, DEFAULT_PORT)
	}
}

/// Resolves `host:port` to a single address, preferring IPv4.
///
/// The relay and the port probe must agree on one concrete address, otherwise
/// `localhost` could be bound on `127.0.0.1` and probed on `::1`.
pub fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
	let addrs: Vec<SocketAddr> = (host, port)
		.to_socket_addrs()
		.map_err(|_| Error::Resolve {
			host: host.to_string(),
			port,
		})?
		.collect();

	addrs
		.iter()
		.find(|addr| addr.is_ipv4())
		.or_else(|| addrs.first())
		.copied()
		.ok_or_else(|| Error::Resolve {
			host: host.to_string(),
			port,
		})
}

/// Per-user file next to the control socket, e.g. `browser-relay-8000.log`.
///
/// Uses the user runtime directory (`$XDG_RUNTIME_DIR`) when available,
/// otherwise falls back to the temp dir with the uid in the name.
pub(crate) fn runtime_file(port: u16, extension: &str) -> PathBuf {
	if let Some(dir) = dirs::runtime_dir() {
		return dir.join(format!("browser-relay-{port}.{extension}"));
	}

	#[cfg(unix)]
	{
		let uid = unsafe { libc::getuid() };
		std::env::temp_dir().join(format!("browser-relay-{port}-{uid}.{extension}"))
	}

	#[cfg(not(unix))]
	{
		std::env::temp_dir().join(format!("browser-relay-{port}.{extension}"))
	}
}
