//! Setup hints printed for interactive users.

use std::io::IsTerminal;
use std::path::Path;

use colored::Colorize;

/// `export BROWSER=...` line pointing at `exe`, quoted for POSIX shells.
pub fn env_hint(exe: &Path) -> String {
	let quoted = exe.display().to_string().replace('\'', r"'\''");
	format!("export BROWSER='{quoted}'")
}

/// Hint for the running executable.
pub fn current_env_hint() -> std::io::Result<String> {
	Ok(env_hint(&std::env::current_exe()?))
}

/// Prints setup instructions unless output is redirected or `BROWSER` is set.
pub fn print_if_unconfigured() {
	if !std::io::stdout().is_terminal() || std::env::var_os("BROWSER").is_some() {
		return;
	}
	let Ok(hint) = current_env_hint() else {
		return;
	};

	println!();
	println!("{}", "!! BROWSER environment variable is not set !!".bright_red().bold());
	println!("The relay is running, but programs only use it once you run");
	println!("  {}", hint.bright_yellow());
	println!("in your shell or add that line to your shell's rc file.");
	println!();
	println!("{}", "How to connect a client:".blue().bold());
	println!(
		"Run this program with {} on a machine that has a browser.",
		"--client --host <this host>".yellow()
	);
	println!();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hint_quotes_path() {
		assert_eq!(
			env_hint(Path::new("/usr/local/bin/browser-relay")),
			"export BROWSER='/usr/local/bin/browser-relay'"
		);
	}

	#[test]
	fn hint_escapes_single_quotes() {
		assert_eq!(env_hint(Path::new("/opt/bob's/relay")), r"export BROWSER='/opt/bob'\''s/relay'");
	}
}
