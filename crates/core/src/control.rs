//! Same-host control channel.
//!
//! The relay listens on a Unix domain socket named after its transport port
//! (`browser-relay-<port>.sock` in the user runtime dir). Short-lived
//! processes connect, exchange one JSON line each way, and disconnect.
//! Where Unix sockets are unavailable a loopback TCP port is used instead.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
#[cfg(unix)]
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use relay_protocol::{ControlRequest, ControlResponse, LineCodec};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::Framed;
use tracing::debug;

use crate::error::{Error, Result};

/// Identity of a relay's control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAddr {
	#[cfg(unix)]
	Socket(PathBuf),
	/// TCP port on 127.0.0.1.
	Loopback(u16),
}

impl ControlAddr {
	/// Default control channel for the relay on transport `port`.
	#[cfg(unix)]
	pub fn for_port(port: u16) -> Self {
		Self::Socket(crate::config::runtime_file(port, "sock"))
	}

	#[cfg(not(unix))]
	pub fn for_port(port: u16) -> Self {
		Self::Loopback(port.checked_add(1).unwrap_or(port - 1))
	}
}

impl fmt::Display for ControlAddr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			#[cfg(unix)]
			Self::Socket(path) => write!(f, "{}", path.display()),
			Self::Loopback(port) => write!(f, "127.0.0.1:{port}"),
		}
	}
}

/// How long [`ping`] waits for a reply from a socket that accepted the connection.
pub const PING_TIMEOUT: Duration = Duration::from_secs(1);

/// Bounded retry for reaching a relay that may still be starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub attempts: u32,
	pub interval: Duration,
}

impl RetryPolicy {
	pub const fn new(attempts: u32, interval: Duration) -> Self {
		Self { attempts, interval }
	}

	/// Single attempt, for callers that only want to know if a relay is up.
	pub const fn once() -> Self {
		Self::new(1, Duration::ZERO)
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(10, Duration::from_millis(300))
	}
}

/// Listening side of the control channel, owned by the relay.
#[derive(Debug)]
pub(crate) enum ControlListener {
	#[cfg(unix)]
	Unix { listener: UnixListener, socket: SocketFile },
	Tcp(TcpListener),
}

impl ControlListener {
	/// Binds the control endpoint.
	///
	/// An existing socket file is only replaced when no relay answers a ping
	/// on it; a live relay's socket fails the bind with `AddrInUse`. The
	/// socket is created owner-only.
	pub(crate) async fn bind(addr: &ControlAddr) -> Result<Self> {
		let bind_err = |source: io::Error| Error::ControlBind {
			endpoint: addr.to_string(),
			source,
		};

		match addr {
			#[cfg(unix)]
			ControlAddr::Socket(path) => {
				if path.exists() {
					if ping(addr).await {
						return Err(bind_err(io::Error::new(
							io::ErrorKind::AddrInUse,
							"another relay answers on this control socket",
						)));
					}
					debug!(target = "relay.control", path = %path.display(), "removing stale control socket");
					std::fs::remove_file(path).map_err(bind_err)?;
				}
				if let Some(parent) = path.parent() {
					std::fs::create_dir_all(parent).map_err(bind_err)?;
				}
				let listener = {
					let _mask = OwnerOnlyUmask::set();
					UnixListener::bind(path).map_err(bind_err)?
				};
				let socket = SocketFile::created_at(path).map_err(bind_err)?;
				Ok(Self::Unix { listener, socket })
			}
			ControlAddr::Loopback(port) => {
				let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, *port))
					.await
					.map_err(bind_err)?;
				Ok(Self::Tcp(listener))
			}
		}
	}

	/// Handle that removes this listener's socket file once the relay stops.
	pub(crate) fn cleanup(&self) -> ControlCleanup {
		match self {
			#[cfg(unix)]
			Self::Unix { socket, .. } => ControlCleanup {
				socket: Some(socket.clone()),
			},
			Self::Tcp(_) => ControlCleanup::default(),
		}
	}

	pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
		match self {
			#[cfg(unix)]
			Self::Unix { .. } => None,
			Self::Tcp(listener) => listener.local_addr().ok(),
		}
	}
}

/// Filesystem leftovers of a bound control endpoint.
#[derive(Debug, Default)]
pub(crate) struct ControlCleanup {
	#[cfg(unix)]
	socket: Option<SocketFile>,
}

impl ControlCleanup {
	pub(crate) fn run(self) {
		#[cfg(unix)]
		if let Some(socket) = self.socket {
			socket.remove();
		}
	}
}

/// A socket file this process created, identified by inode so that a file
/// another relay bound at the same path later is left alone.
#[cfg(unix)]
#[derive(Debug, Clone)]
pub(crate) struct SocketFile {
	path: PathBuf,
	ino: u64,
}

#[cfg(unix)]
impl SocketFile {
	fn created_at(path: &Path) -> io::Result<Self> {
		use std::os::unix::fs::MetadataExt;

		let ino = std::fs::symlink_metadata(path)?.ino();
		Ok(Self {
			path: path.to_path_buf(),
			ino,
		})
	}

	fn remove(&self) {
		use std::os::unix::fs::MetadataExt;

		match std::fs::symlink_metadata(&self.path) {
			Ok(meta) if meta.ino() == self.ino => {
				if let Err(err) = std::fs::remove_file(&self.path) {
					debug!(target = "relay.control", path = %self.path.display(), error = %err, "failed to remove control socket");
				}
			}
			Ok(_) => {
				debug!(target = "relay.control", path = %self.path.display(), "control socket was replaced, leaving it");
			}
			Err(err) if err.kind() == io::ErrorKind::NotFound => {}
			Err(err) => {
				debug!(target = "relay.control", path = %self.path.display(), error = %err, "failed to inspect control socket");
			}
		}
	}
}

/// Sets the process umask to `0o177` until dropped, so a socket is never
/// reachable by other users between creation and first use.
///
/// The mask is process-wide: files created by other threads meanwhile get it
/// too. Guards are serialized so overlapping binds restore the right mask.
#[cfg(unix)]
struct OwnerOnlyUmask {
	previous: libc::mode_t,
	_lock: parking_lot::MutexGuard<'static, ()>,
}

#[cfg(unix)]
static UMASK_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

#[cfg(unix)]
impl OwnerOnlyUmask {
	fn set() -> Self {
		let lock = UMASK_LOCK.lock();
		// SAFETY: umask only swaps an integer in the process state.
		let previous = unsafe { libc::umask(0o177) };
		Self { previous, _lock: lock }
	}
}

#[cfg(unix)]
impl Drop for OwnerOnlyUmask {
	fn drop(&mut self) {
		// SAFETY: see `set`.
		unsafe {
			libc::umask(self.previous);
		}
	}
}

/// Sends one request and waits for its reply, retrying the connect step.
///
/// Only connection establishment is retried; once connected, a failed
/// exchange is reported immediately.
pub async fn request(addr: &ControlAddr, request: &ControlRequest, retry: RetryPolicy) -> Result<ControlResponse> {
	let attempts = retry.attempts.max(1);
	let mut last_err = None;

	for attempt in 1..=attempts {
		match connect_and_exchange(addr, request).await {
			Err(ConnectFailed(err)) => {
				debug!(target = "relay.control", endpoint = %addr, attempt, error = %err, "control connect failed");
				last_err = Some(err);
				if attempt < attempts {
					tokio::time::sleep(retry.interval).await;
				}
			}
			Ok(result) => return result,
		}
	}

	Err(Error::ControlUnavailable {
		attempts,
		source: last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotConnected)),
	})
}

/// Returns whether a relay answers `ping` on `addr` within [`PING_TIMEOUT`].
pub async fn ping(addr: &ControlAddr) -> bool {
	let reply = tokio::time::timeout(PING_TIMEOUT, request(addr, &ControlRequest::Ping, RetryPolicy::once())).await;
	matches!(reply, Ok(Ok(ControlResponse::Pong)))
}

struct ConnectFailed(io::Error);

async fn connect_and_exchange(
	addr: &ControlAddr,
	request: &ControlRequest,
) -> std::result::Result<Result<ControlResponse>, ConnectFailed> {
	match addr {
		#[cfg(unix)]
		ControlAddr::Socket(path) => {
			let stream = UnixStream::connect(path).await.map_err(ConnectFailed)?;
			Ok(exchange(stream, request).await)
		}
		ControlAddr::Loopback(port) => {
			let stream = TcpStream::connect((Ipv4Addr::LOCALHOST, *port))
				.await
				.map_err(ConnectFailed)?;
			Ok(exchange(stream, request).await)
		}
	}
}

async fn exchange<S>(stream: S, request: &ControlRequest) -> Result<ControlResponse>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	let mut framed = Framed::new(stream, LineCodec::new());
	framed.send(request.to_line()?).await?;

	match framed.next().await {
		Some(line) => Ok(ControlResponse::from_line(&line?)?),
		None => Err(Error::Protocol("control connection closed without a reply".to_string())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_retry_budget_is_bounded() {
		let retry = RetryPolicy::default();
		assert_eq!(retry.attempts, 10);
		assert_eq!(retry.interval, Duration::from_millis(300));
	}

	#[cfg(unix)]
	#[test]
	fn socket_name_follows_port() {
		let ControlAddr::Socket(path) = ControlAddr::for_port(8000) else {
			panic!("expected a socket path");
		};
		let name = path.file_name().unwrap().to_string_lossy().into_owned();
		assert!(name.starts_with("browser-relay-8000"), "{name}");
		assert!(name.ends_with(".sock"), "{name}");
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn request_to_missing_socket_exhausts_retries() {
		let dir = tempfile::tempdir().unwrap();
		let addr = ControlAddr::Socket(dir.path().join("absent.sock"));
		let retry = RetryPolicy::new(3, Duration::from_millis(10));

		let err = request(&addr, &ControlRequest::Ping, retry).await.unwrap_err();
		assert!(matches!(err, Error::ControlUnavailable { attempts: 3, .. }), "{err}");
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn bind_replaces_stale_socket_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested").join("relay.sock");
		std::fs::create_dir_all(path.parent().unwrap()).unwrap();
		std::fs::write(&path, b"stale").unwrap();

		let addr = ControlAddr::Socket(path.clone());
		let listener = ControlListener::bind(&addr).await.unwrap();
		assert!(listener.local_addr().is_none());

		let cleanup = listener.cleanup();
		drop(listener);
		cleanup.run();
		assert!(!path.exists());
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn socket_is_owner_only() {
		use std::os::unix::fs::PermissionsExt;

		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("relay.sock");
		let listener = ControlListener::bind(&ControlAddr::Socket(path.clone())).await.unwrap();

		let mode = std::fs::metadata(&path).unwrap().permissions().mode();
		assert_eq!(mode & 0o777, 0o600);
		drop(listener);
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn cleanup_leaves_a_replaced_socket_alone() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("relay.sock");
		let addr = ControlAddr::Socket(path.clone());

		// Bound but never accepting: the ping times out and the path is taken over.
		let first = ControlListener::bind(&addr).await.unwrap();
		let first_cleanup = first.cleanup();

		let second = ControlListener::bind(&addr).await.unwrap();
		first_cleanup.run();
		assert!(path.exists(), "stale handle removed the new socket");
		drop(first);

		second.cleanup().run();
		assert!(!path.exists());
	}

	#[tokio::test]
	async fn ping_without_relay_is_false() {
		let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();
		drop(listener);

		assert!(!ping(&ControlAddr::Loopback(port)).await);
	}
}
