//! Error types for the relay core.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the relay, launcher, and browser client.
#[derive(Debug, Error)]
pub enum Error {
	/// Another process already owns the transport port.
	#[error("Address {addr} is already in use; is another relay running?")]
	AddrInUse { addr: SocketAddr },

	/// Binding the transport listener failed for a reason other than contention.
	#[error("Failed to bind relay listener on {addr}: {source}")]
	Bind {
		addr: SocketAddr,
		#[source]
		source: io::Error,
	},

	/// The configured host did not resolve to any socket address.
	#[error("Could not resolve {host}:{port}")]
	Resolve { host: String, port: u16 },

	/// The local control endpoint could not be created.
	#[error("Failed to bind control endpoint {endpoint}: {source}")]
	ControlBind {
		endpoint: String,
		#[source]
		source: io::Error,
	},

	/// No relay accepted a control connection within the retry budget.
	#[error("Relay control endpoint unavailable after {attempts} attempts: {source}")]
	ControlUnavailable {
		attempts: u32,
		#[source]
		source: io::Error,
	},

	/// The relay answered a control request with something unexpected.
	#[error("Control protocol error: {0}")]
	Protocol(String),

	/// A launcher was asked to deliver something that is not an HTTP(S) URL.
	#[error("Not an http(s) URL: {0}")]
	NotAUrl(String),

	/// The encoded control request would exceed the relay's line limit.
	#[error("URL too long: request is {len} bytes, the relay accepts at most {max}")]
	UrlTooLong { len: usize, max: usize },

	/// Spawning the background relay process failed.
	#[error("Failed to spawn background relay (log {}): {source}", .log_path.display())]
	Spawn {
		log_path: PathBuf,
		#[source]
		source: io::Error,
	},

	/// A browser client could not reach the relay.
	#[error("Failed to connect to relay at {addr}: {source}")]
	Connect {
		addr: String,
		#[source]
		source: io::Error,
	},

	/// Operation not valid in the server's current lifecycle state.
	#[error("Relay is {0:?}; operation requires a freshly created relay")]
	InvalidState(crate::server::Lifecycle),

	#[error("I/O error: {0}")]
	Io(#[from] io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}
