//! Bootstrap: make sure a relay is running, then hand it a URL.
//!
//! 1. Probe the configured transport port.
//! 2. If nothing holds it, spawn a detached relay process (no readiness wait).
//! 3. Deliver the URL over the control channel, retrying the connect until
//!    the relay accepts or the retry budget runs out.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use relay_protocol::{ControlRequest, ControlResponse, MAX_LINE_LENGTH, is_url};
use tracing::info;

use crate::config::ServerConfig;
use crate::control::{self, RetryPolicy};
use crate::error::{Error, Result};
use crate::server::RelayServer;

/// Starts a relay for `config` somewhere other than the current process.
pub trait SpawnRelay {
	fn spawn_relay(&self, config: &ServerConfig) -> Result<()>;
}

/// Re-runs a program (normally this executable) in server mode, detached
/// from the caller's session with output redirected to the config's log sink.
#[derive(Debug, Clone)]
pub struct DetachedProcess {
	program: PathBuf,
	args: Vec<OsString>,
}

impl DetachedProcess {
	pub fn new(program: impl Into<PathBuf>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
		}
	}

	/// Targets the currently running executable.
	pub fn current_exe() -> Result<Self> {
		Ok(Self::new(std::env::current_exe()?))
	}

	pub fn args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<OsString>,
	{
		self.args.extend(args.into_iter().map(Into::into));
		self
	}
}

impl SpawnRelay for DetachedProcess {
	fn spawn_relay(&self, config: &ServerConfig) -> Result<()> {
		let spawn_err = |source| Error::Spawn {
			log_path: config.log_path.clone(),
			source,
		};

		if let Some(parent) = config.log_path.parent() {
			std::fs::create_dir_all(parent).map_err(spawn_err)?;
		}
		// Append: two launchers racing to start a relay may share the sink.
		let log = OpenOptions::new()
			.create(true)
			.append(true)
			.open(&config.log_path)
			.map_err(spawn_err)?;
		let log_err = log.try_clone().map_err(spawn_err)?;

		let mut command = Command::new(&self.program);
		command
			.args(&self.args)
			.stdin(Stdio::null())
			.stdout(Stdio::from(log))
			.stderr(Stdio::from(log_err));
		detach(&mut command);

		// The child is intentionally not waited on; it outlives this process.
		let child = command.spawn().map_err(spawn_err)?;
		info!(
			target = "relay.launcher",
			pid = child.id(),
			program = %self.program.display(),
			log = %config.log_path.display(),
			"spawned background relay"
		);
		Ok(())
	}
}

/// Starts the child in a new session so it has no controlling terminal and
/// survives the parent shell's hangup.
#[cfg(unix)]
fn detach(command: &mut Command) {
	use std::os::unix::process::CommandExt;

	// SAFETY: setsid is async-signal-safe and touches no parent state.
	unsafe {
		command.pre_exec(|| {
			if libc::setsid() == -1 {
				return Err(std::io::Error::last_os_error());
			}
			Ok(())
		});
	}
}

#[cfg(windows)]
fn detach(command: &mut Command) {
	use std::os::windows::process::CommandExt;

	const DETACHED_PROCESS: u32 = 0x0000_0008;
	const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
	command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

/// Outcome of a successful hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
	/// Whether this call had to start the relay.
	pub spawned: bool,
	/// Browser clients the URL was queued to.
	pub clients: usize,
}

/// Delivers URLs to the relay described by `config`, starting it on demand.
#[derive(Debug)]
pub struct Launcher<S> {
	config: ServerConfig,
	spawner: S,
	retry: RetryPolicy,
}

impl<S: SpawnRelay> Launcher<S> {
	pub fn new(config: ServerConfig, spawner: S) -> Self {
		Self {
			config,
			spawner,
			retry: RetryPolicy::default(),
		}
	}

	pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;
		self
	}

	/// Ensures a relay is running and sends it `url`.
	///
	/// Fails with [`Error::ControlUnavailable`] if no relay accepts the control
	/// connection within the retry budget, so a URL is never dropped silently.
	pub async fn deliver(&self, url: &str) -> Result<Delivery> {
		if !is_url(url) {
			return Err(Error::NotAUrl(url.to_string()));
		}
		let request = ControlRequest::Message {
			payload: url.to_string(),
		};
		let encoded = request.to_line()?.len();
		if encoded > MAX_LINE_LENGTH {
			return Err(Error::UrlTooLong {
				len: encoded,
				max: MAX_LINE_LENGTH,
			});
		}

		let relay = RelayServer::new(self.config.clone());
		let spawned = if relay.port_in_use() {
			false
		} else {
			info!(target = "relay.launcher", host = %self.config.host, port = self.config.port, "relay is not running, starting it");
			self.spawner.spawn_relay(&self.config)?;
			true
		};

		match control::request(&self.config.control, &request, self.retry).await? {
			ControlResponse::Delivered { clients } => {
				info!(target = "relay.launcher", url, clients, "url handed to relay");
				Ok(Delivery { spawned, clients })
			}
			ControlResponse::Error { message } => Err(Error::Protocol(message)),
			other => Err(Error::Protocol(format!("unexpected control response: {other:?}"))),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;
	use std::time::Duration;

	use super::*;

	struct CountingSpawner(Cell<usize>);

	impl SpawnRelay for CountingSpawner {
		fn spawn_relay(&self, _config: &ServerConfig) -> Result<()> {
			self.0.set(self.0.get() + 1);
			Ok(())
		}
	}

	#[tokio::test]
	async fn rejects_non_url_before_probing() {
		let launcher = Launcher::new(ServerConfig::new("127.0.0.1", 0), CountingSpawner(Cell::new(0)));
		let err = launcher.deliver("not-a-url").await.unwrap_err();
		assert!(matches!(err, Error::NotAUrl(_)));
		assert_eq!(launcher.spawner.0.get(), 0);
	}

	#[tokio::test]
	async fn rejects_overlong_url_before_probing() {
		let launcher = Launcher::new(ServerConfig::new("127.0.0.1", 0), CountingSpawner(Cell::new(0)));
		let url = format!("https://example.com/{}", "a".repeat(MAX_LINE_LENGTH));

		let err = launcher.deliver(&url).await.unwrap_err();
		assert!(matches!(err, Error::UrlTooLong { max: MAX_LINE_LENGTH, .. }), "{err}");
		assert_eq!(launcher.spawner.0.get(), 0);
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn exhausted_retries_surface_as_error() {
		let dir = tempfile::tempdir().unwrap();
		let port = {
			let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
			listener.local_addr().unwrap().port()
		};
		let config = ServerConfig::new("127.0.0.1", port)
			.with_control(control::ControlAddr::Socket(dir.path().join("relay.sock")));
		let launcher = Launcher::new(config, CountingSpawner(Cell::new(0)))
			.with_retry(RetryPolicy::new(2, Duration::from_millis(10)));

		let err = launcher.deliver("https://example.com").await.unwrap_err();
		assert!(matches!(err, Error::ControlUnavailable { attempts: 2, .. }), "{err}");
		assert_eq!(launcher.spawner.0.get(), 1, "free port should trigger a spawn");
	}

	#[test]
	fn detached_process_collects_args() {
		let spawner = DetachedProcess::new("/usr/bin/browser-relay").args(["--port", "9000"]);
		assert_eq!(spawner.args, vec![OsString::from("--port"), OsString::from("9000")]);
	}

	#[cfg(unix)]
	#[test]
	fn spawn_failure_names_log_sink() {
		let dir = tempfile::tempdir().unwrap();
		let config = ServerConfig::new("127.0.0.1", 0).with_log_path(dir.path().join("relay.log"));
		let spawner = DetachedProcess::new(dir.path().join("does-not-exist"));

		let err = spawner.spawn_relay(&config).unwrap_err();
		assert!(matches!(err, Error::Spawn { .. }), "{err}");
		assert!(dir.path().join("relay.log").exists());
	}

	#[cfg(unix)]
	#[test]
	fn log_sink_is_appended_not_truncated() {
		let dir = tempfile::tempdir().unwrap();
		let log = dir.path().join("relay.log");
		std::fs::write(&log, "earlier relay output\n").unwrap();
		let config = ServerConfig::new("127.0.0.1", 0).with_log_path(&log);

		DetachedProcess::new("/bin/sh")
			.args(["-c", "echo second relay"])
			.spawn_relay(&config)
			.unwrap();

		let deadline = std::time::Instant::now() + Duration::from_secs(5);
		loop {
			let contents = std::fs::read_to_string(&log).unwrap();
			if contents.contains("second relay") {
				assert!(contents.starts_with("earlier relay output\n"), "{contents:?}");
				break;
			}
			assert!(std::time::Instant::now() < deadline, "child never wrote: {contents:?}");
			std::thread::sleep(Duration::from_millis(20));
		}
	}
}
