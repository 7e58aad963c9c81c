use clap::Parser;

use super::*;

fn parse(args: &[&str]) -> Cli {
	let mut argv = vec!["browser-relay"];
	argv.extend_from_slice(args);
	Cli::try_parse_from(argv).unwrap()
}

#[test]
fn bare_invocation_serves_with_defaults() {
	let cli = parse(&[]);
	assert_eq!(cli.mode(), Mode::Serve);
	assert_eq!(cli.host, DEFAULT_HOST);
	assert_eq!(cli.port, DEFAULT_PORT);
	assert_eq!(cli.verbose, 0);
}

#[test]
fn url_argument_opens() {
	let cli = parse(&["https://example.com/test"]);
	assert_eq!(cli.mode(), Mode::Open("https://example.com/test".to_string()));
}

#[test]
fn non_url_argument_falls_back_to_serving() {
	let cli = parse(&["not-a-url"]);
	assert_eq!(cli.mode(), Mode::Serve);
}

#[test]
fn short_h_is_host_not_help() {
	let cli = parse(&["-h", "relay.internal", "-p", "9000"]);
	assert_eq!(cli.host, "relay.internal");
	assert_eq!(cli.port, 9000);
}

#[test]
fn client_mode_with_app() {
	let cli = parse(&["--client", "-a", "firefox", "--host", "10.0.0.5"]);
	assert_eq!(cli.mode(), Mode::Client);
	let config = cli.client_config();
	assert_eq!(config.host, "10.0.0.5");
	assert_eq!(config.app.as_deref(), Some("firefox"));
}

#[test]
fn client_and_url_conflict() {
	assert!(Cli::try_parse_from(["browser-relay", "-c", "https://example.com"]).is_err());
}

#[test]
fn status_and_stop_conflict() {
	assert!(Cli::try_parse_from(["browser-relay", "--status", "--stop"]).is_err());
}

#[test]
fn rc_wins_over_other_modes() {
	let cli = parse(&["--rc", "--client"]);
	assert_eq!(cli.mode(), Mode::Rc);
}

#[test]
fn help_flag_is_long_only() {
	let err = Cli::try_parse_from(["browser-relay", "--help"]).unwrap_err();
	assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
}

#[test]
fn serve_args_target_same_endpoint() {
	let cli = parse(&["-p", "9100", "-h", "127.0.0.1", "https://example.com"]);
	let args = cli.serve_args();
	assert!(args.windows(2).any(|pair| pair == ["--port", "9100"]));
	assert!(args.windows(2).any(|pair| pair == ["--host", "127.0.0.1"]));
	assert!(!args.iter().any(|arg| arg.starts_with("http")));
}

#[cfg(unix)]
#[test]
fn socket_override_reaches_config_and_child() {
	let cli = parse(&["--socket", "/tmp/relay-test.sock", "--log-file", "/tmp/relay-test.log"]);
	let config = cli.server_config();
	assert_eq!(
		config.control,
		relay::ControlAddr::Socket(PathBuf::from("/tmp/relay-test.sock"))
	);
	assert_eq!(config.log_path, PathBuf::from("/tmp/relay-test.log"));
	assert!(cli.serve_args().windows(2).any(|pair| pair == ["--socket", "/tmp/relay-test.sock"]));
}
