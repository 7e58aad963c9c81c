//! The relay: a TCP listener for browser clients plus a same-host control
//! endpoint that feeds URLs into a broadcast.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──up()──► Listening ──down()──► Stopped
//!    │                                      ▲
//!    └──────── up() hits AddrInUse ─────────┘
//! ```
//!
//! There is no restart; a stopped relay is discarded.

mod dispatch;
mod downstream;

use std::net::SocketAddr;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::control::{ControlCleanup, ControlListener};
use crate::error::{Error, Result};
use crate::probe;
use crate::registry::Registry;

/// Pause after a failed `accept` so a persistent error (e.g. EMFILE) cannot spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
	Created,
	Listening,
	Stopped,
}

#[derive(Debug)]
struct Inner {
	lifecycle: Lifecycle,
	local_addr: Option<SocketAddr>,
	control: Option<ControlCleanup>,
	tasks: Vec<JoinHandle<()>>,
}

/// Relay server owning the transport listener and the control endpoint.
#[derive(Debug)]
pub struct RelayServer {
	config: ServerConfig,
	registry: Registry,
	inner: Mutex<Inner>,
	shutdown: watch::Sender<bool>,
}

impl RelayServer {
	/// Creates a relay descriptor. Nothing is bound until [`up`](Self::up).
	pub fn new(config: ServerConfig) -> Self {
		let (shutdown, _) = watch::channel(false);
		Self {
			config,
			registry: Registry::new(),
			inner: Mutex::new(Inner {
				lifecycle: Lifecycle::Created,
				local_addr: None,
				control: None,
				tasks: Vec::new(),
			}),
			shutdown,
		}
	}

	/// Binds the transport listener, then the control endpoint, and starts
	/// accepting on both.
	///
	/// If the transport port is already taken the relay stops itself and
	/// returns [`Error::AddrInUse`]; another relay is presumably running and
	/// its control socket is left untouched. Any other transport bind failure
	/// is logged and the relay continues with the control endpoint only,
	/// unless another relay already answers on that endpoint, in which case
	/// this relay stops and returns [`Error::ControlBind`].
	pub async fn up(&self) -> Result<()> {
		let lifecycle = self.lifecycle();
		if lifecycle != Lifecycle::Created {
			return Err(Error::InvalidState(lifecycle));
		}

		let transport = match self.bind_transport().await {
			Ok(listener) => Some(listener),
			Err(err @ Error::AddrInUse { .. }) => {
				warn!(target = "relay.server", error = %err, "port is already in use, cannot start the relay");
				self.down().await;
				return Err(err);
			}
			Err(err) => {
				error!(target = "relay.server", error = %err, "transport listener unavailable, continuing without it");
				None
			}
		};

		let local_addr = transport.as_ref().and_then(|listener| listener.local_addr().ok());
		if let Some(addr) = local_addr {
			info!(target = "relay.server", %addr, "relay is listening");
		}

		let control = match ControlListener::bind(&self.config.control).await {
			Ok(control) => control,
			Err(err) => {
				error!(target = "relay.server", error = %err, "control endpoint unavailable");
				drop(transport);
				self.down().await;
				return Err(err);
			}
		};
		info!(
			target = "relay.server",
			endpoint = %self.config.control,
			tcp = ?control.local_addr(),
			"control endpoint ready"
		);

		let mut inner = self.inner.lock();
		if inner.lifecycle != Lifecycle::Created {
			// down() ran while we were binding; release everything unused.
			let lifecycle = inner.lifecycle;
			drop(inner);
			let cleanup = control.cleanup();
			drop(control);
			cleanup.run();
			return Err(Error::InvalidState(lifecycle));
		}
		if let Some(listener) = transport {
			inner.tasks.push(tokio::spawn(accept_downstream(listener, self.registry.clone())));
		}
		let context = dispatch::Context {
			registry: self.registry.clone(),
			shutdown: self.shutdown.clone(),
			local_addr,
		};
		inner.control = Some(control.cleanup());
		inner.tasks.push(tokio::spawn(dispatch::accept(control, context)));
		inner.local_addr = local_addr;
		inner.lifecycle = Lifecycle::Listening;
		Ok(())
	}

	async fn bind_transport(&self) -> Result<TcpListener> {
		let addr = self.config.resolve()?;
		TcpListener::bind(addr).await.map_err(|source| {
			if source.kind() == std::io::ErrorKind::AddrInUse {
				Error::AddrInUse { addr }
			} else {
				Error::Bind { addr, source }
			}
		})
	}

	/// Stops both listeners and removes the control socket.
	///
	/// Idempotent. Returns once both listeners have been released. Connections
	/// that are already established are left to the process exit.
	pub async fn down(&self) {
		let (tasks, control) = {
			let mut inner = self.inner.lock();
			if inner.lifecycle == Lifecycle::Stopped {
				return;
			}
			inner.lifecycle = Lifecycle::Stopped;
			inner.local_addr = None;
			(std::mem::take(&mut inner.tasks), inner.control.take())
		};

		info!(target = "relay.server", "shutting down relay");
		self.shutdown.send_replace(true);

		for task in tasks {
			task.abort();
			if let Err(err) = task.await {
				if !err.is_cancelled() {
					debug!(target = "relay.server", error = %err, "listener task ended abnormally");
				}
			}
		}

		if let Some(control) = control {
			control.run();
		}
	}

	/// Resolves once shutdown was requested over the control channel or
	/// [`down`](Self::down) has run.
	pub async fn shutdown_requested(&self) {
		let mut rx = self.shutdown.subscribe();
		let _ = rx.wait_for(|requested| *requested).await;
	}

	/// Probes this relay's configured transport address.
	pub fn port_in_use(&self) -> bool {
		probe::port_in_use(&self.config.host, self.config.port)
	}

	pub fn lifecycle(&self) -> Lifecycle {
		self.inner.lock().lifecycle
	}

	/// Bound transport address while listening.
	pub fn local_addr(&self) -> Option<SocketAddr> {
		self.inner.lock().local_addr
	}

	pub fn client_count(&self) -> usize {
		self.registry.count()
	}

}

async fn accept_downstream(listener: TcpListener, registry: Registry) {
	loop {
		match listener.accept().await {
			Ok((stream, peer)) => {
				let (registration, outbound) = registry.add(peer);
				info!(
					target = "relay.server",
					conn = registration.id(),
					%peer,
					clients = registry.count(),
					"browser client connected"
				);
				tokio::spawn(downstream::serve(stream, registration, outbound));
			}
			Err(err) => {
				warn!(target = "relay.server", error = %err, "accept failed");
				tokio::time::sleep(ACCEPT_BACKOFF).await;
			}
		}
	}
}
