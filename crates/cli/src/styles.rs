//! Help and error styling for the `browser-relay` binary.

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};

/// Cargo-like help colours; errors and the example block stand out in red/yellow.
pub fn cli_styles() -> Styles {
	let accent = AnsiColor::Green.on_default().effects(Effects::BOLD);
	let literal = AnsiColor::Cyan.on_default();

	Styles::styled()
		.header(accent)
		.usage(accent)
		.literal(literal)
		.placeholder(literal)
		.valid(literal)
		.invalid(AnsiColor::Yellow.on_default())
		.error(AnsiColor::Red.on_default().effects(Effects::BOLD))
}
