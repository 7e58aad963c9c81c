//! Syntactic URL check applied on both ends of the relay.

const SCHEMES: [&str; 2] = ["http://", "https://"];

/// Returns true when `line` starts with an HTTP(S) scheme.
///
/// This is a prefix test only. Anything after the scheme is forwarded
/// verbatim and left to the browser to interpret.
pub fn is_url(line: &str) -> bool {
	SCHEMES.iter().any(|scheme| line.starts_with(scheme))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_http_and_https() {
		assert!(is_url("http://localhost:3000/callback?code=abc"));
		assert!(is_url("https://example.com/test"));
	}

	#[test]
	fn rejects_other_input() {
		assert!(!is_url("not-a-url"));
		assert!(!is_url(""));
		assert!(!is_url("ftp://example.com"));
		assert!(!is_url(" https://example.com"));
		assert!(!is_url("HTTPS://EXAMPLE.COM"));
		assert!(!is_url("file:///etc/passwd"));
	}
}
