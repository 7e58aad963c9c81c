//! Hand-off to the operating system's URL handler.

use std::io;

/// Opens a URL in a browser on this machine.
pub trait Opener: Send + Sync {
	/// Opens `url`, preferring the application named `app` when given.
	fn open(&self, url: &str, app: Option<&str>) -> io::Result<()>;
}

/// Uses the platform launcher (`xdg-open`, `open`, `start`) via the `open` crate.
///
/// The launcher is spawned detached; this does not wait for the browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl Opener for SystemOpener {
	fn open(&self, url: &str, app: Option<&str>) -> io::Result<()> {
		match app {
			Some(app) => open::with_detached(url, app),
			None => open::that_detached(url),
		}
	}
}

impl<F> Opener for F
where
	F: Fn(&str, Option<&str>) -> io::Result<()> + Send + Sync,
{
	fn open(&self, url: &str, app: Option<&str>) -> io::Result<()> {
		self(url, app)
	}
}
