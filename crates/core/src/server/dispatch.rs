//! Control-plane handling inside the relay.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use relay_protocol::{ControlRequest, ControlResponse, LineCodec, LineTooLong, is_url};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use super::ACCEPT_BACKOFF;
use crate::control::ControlListener;
use crate::error::Result;
use crate::registry::Registry;

/// Upper bound on how long a control peer may stay silent.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a control connection needs from the relay.
#[derive(Debug, Clone)]
pub(super) struct Context {
	pub registry: Registry,
	pub shutdown: watch::Sender<bool>,
	pub local_addr: Option<SocketAddr>,
}

pub(super) async fn accept(listener: ControlListener, context: Context) {
	loop {
		let accepted = match &listener {
			#[cfg(unix)]
			ControlListener::Unix { listener, .. } => listener.accept().await.map(|(stream, _)| {
				tokio::spawn(serve(stream, context.clone()));
			}),
			ControlListener::Tcp(listener) => listener.accept().await.map(|(stream, _)| {
				tokio::spawn(serve(stream, context.clone()));
			}),
		};

		if let Err(err) = accepted {
			warn!(target = "relay.control", error = %err, "control accept failed");
			tokio::time::sleep(ACCEPT_BACKOFF).await;
		}
	}
}

async fn serve<S>(stream: S, context: Context)
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	if let Err(err) = handle_connection(stream, &context).await {
		debug!(target = "relay.control", error = %err, "control connection ended with error");
	}
}

async fn handle_connection<S>(stream: S, context: &Context) -> Result<()>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	let mut framed = Framed::new(stream, LineCodec::strict());

	loop {
		let line = match tokio::time::timeout(IDLE_TIMEOUT, framed.next()).await {
			Ok(Some(Ok(line))) => line,
			Ok(Some(Err(err))) => {
				let Some(overflow) = LineTooLong::from_io(&err) else {
					return Err(err.into());
				};
				warn!(target = "relay.control", max = overflow.max, "rejecting overlong control request");
				let response = ControlResponse::Error {
					message: format!("control request too long: {overflow}"),
				};
				framed.send(response.to_line()?).await?;
				return Ok(());
			}
			Ok(None) => return Ok(()),
			Err(_) => {
				debug!(target = "relay.control", "closing idle control connection");
				return Ok(());
			}
		};

		let response = match ControlRequest::from_line(&line) {
			Ok(request) => context.handle(request),
			Err(err) => ControlResponse::Error {
				message: format!("invalid control request: {err}"),
			},
		};
		framed.send(response.to_line()?).await?;
	}
}

impl Context {
	pub(super) fn handle(&self, request: ControlRequest) -> ControlResponse {
		match request {
			ControlRequest::Message { payload } => {
				if !is_url(&payload) {
					debug!(target = "relay.control", "ignoring non-url control message");
					return ControlResponse::Ignored;
				}
				let clients = self.registry.broadcast(&payload);
				info!(target = "relay.control", url = %payload, clients, "broadcast url");
				ControlResponse::Delivered { clients }
			}
			ControlRequest::Ping => ControlResponse::Pong,
			ControlRequest::Status => ControlResponse::Status {
				clients: self.registry.count(),
				addr: self.local_addr.map(|addr| addr.to_string()),
			},
			ControlRequest::Shutdown => {
				info!(target = "relay.control", "shutdown requested via control channel");
				self.shutdown.send_replace(true);
				ControlResponse::Ok
			}
		}
	}
}
