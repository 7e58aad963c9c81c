use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Installs the stderr subscriber. `RUST_LOG` takes precedence over `-v`.
pub fn init_logging(verbosity: u8) {
	tracing_subscriber::fmt()
		.with_env_filter(env_filter(verbosity))
		.with_writer(std::io::stderr.with_max_level(tracing::Level::TRACE))
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}

fn env_filter(verbosity: u8) -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)))
}

// 0 = warnings only, so a $BROWSER hand-off stays quiet
// 1 (-v) = lifecycle events (spawned relays always run with this)
// 2+ (-vv) = per-connection and control-plane detail
fn default_directive(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "warn",
		1 => "info",
		_ => "debug",
	}
}
