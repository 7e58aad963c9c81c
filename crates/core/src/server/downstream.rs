//! Per-connection task for one browser client.

use futures::SinkExt;
use relay_protocol::{DATA_ACK, LineCodec};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tracing::{debug, info, warn};

use crate::registry::{Outbound, Registration};

const READ_BUFFER: usize = 1024;

/// Pumps queued URLs to the socket until the peer goes away.
///
/// Upstream bytes are not part of the protocol; each read is answered with
/// [`DATA_ACK`] and otherwise ignored. The registration is dropped when this
/// returns, which removes the connection from the registry exactly once.
pub(crate) async fn serve(stream: TcpStream, registration: Registration, mut outbound: mpsc::UnboundedReceiver<Outbound>) {
	let conn = registration.id();
	let peer = registration.peer();
	let (mut reader, writer) = stream.into_split();
	let mut sink = FramedWrite::new(writer, LineCodec::new());
	let mut buf = [0u8; READ_BUFFER];

	loop {
		tokio::select! {
			read = reader.read(&mut buf) => match read {
				Ok(0) => {
					info!(target = "relay.server", conn, %peer, "browser client disconnected");
					break;
				}
				Ok(n) => {
					debug!(
						target = "relay.server",
						conn,
						data = %String::from_utf8_lossy(&buf[..n]),
						"received upstream data"
					);
					if let Err(err) = sink.send(DATA_ACK).await {
						warn!(target = "relay.server", conn, %peer, error = %err, "failed to acknowledge upstream data");
						break;
					}
				}
				Err(err) => {
					warn!(target = "relay.server", conn, %peer, error = %err, "browser client read failed");
					break;
				}
			},
			line = outbound.recv() => match line {
				Some(line) => {
					if let Err(err) = sink.send(line).await {
						warn!(target = "relay.server", conn, %peer, error = %err, "failed to deliver url");
						break;
					}
				}
				None => {
					debug!(target = "relay.server", conn, "connection removed from registry");
					break;
				}
			},
		}
	}

	drop(registration);
}
