//! Browser client: connects out to a relay and opens every URL it pushes.

use futures::StreamExt;
use relay_protocol::{LineCodec, is_url};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::opener::{Opener, SystemOpener};

pub struct BrowserClient<O = SystemOpener> {
	config: ClientConfig,
	opener: O,
}

impl BrowserClient<SystemOpener> {
	pub fn new(config: ClientConfig) -> Self {
		Self::with_opener(config, SystemOpener)
	}
}

impl<O: Opener> BrowserClient<O> {
	pub fn with_opener(config: ClientConfig, opener: O) -> Self {
		Self { config, opener }
	}

	/// Connects to the relay and handles pushed lines until it hangs up.
	///
	/// Lines are reassembled across reads, so a URL split over several TCP
	/// segments is opened once, whole. Opener failures are logged and do not
	/// end the session.
	pub async fn up(&self) -> Result<()> {
		let addr = format!("{}:{}", self.config.host, self.config.port);
		let stream = TcpStream::connect((self.config.host.as_str(), self.config.port))
			.await
			.map_err(|source| Error::Connect {
				addr: addr.clone(),
				source,
			})?;
		info!(target = "relay.client", %addr, "connected to relay");

		let mut lines = FramedRead::new(stream, LineCodec::new());
		while let Some(line) = lines.next().await {
			self.handle_line(&line?);
		}

		info!(target = "relay.client", %addr, "relay closed the connection");
		Ok(())
	}

	fn handle_line(&self, line: &str) {
		debug!(target = "relay.client", data = line, "received line");
		if !is_url(line) {
			return;
		}

		info!(target = "relay.client", url = line, app = ?self.config.app, "opening url in browser");
		if let Err(err) = self.opener.open(line, self.config.app.as_deref()) {
			warn!(target = "relay.client", url = line, error = %err, "failed to open url");
		}
	}
}
