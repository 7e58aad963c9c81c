//! One-shot check for whether a TCP port is already bound.
//!
//! The probe answers "can this process bind here", not "is a healthy relay
//! listening". Only `AddrInUse` counts as in use; every other bind failure
//! reports the port as free.

use std::io;
use std::net::{SocketAddr, TcpListener};

use tracing::debug;

use crate::config::resolve;

/// Returns true if `host:port` is already bound by someone else.
pub fn port_in_use(host: &str, port: u16) -> bool {
	match resolve(host, port) {
		Ok(addr) => addr_in_use(addr),
		Err(err) => {
			debug!(target = "relay.probe", host, port, error = %err, "probe could not resolve host");
			false
		}
	}
}

/// Attempts a transient bind on `addr`; the listener is dropped before returning.
pub fn addr_in_use(addr: SocketAddr) -> bool {
	match TcpListener::bind(addr) {
		Ok(listener) => {
			drop(listener);
			false
		}
		Err(err) if err.kind() == io::ErrorKind::AddrInUse => true,
		Err(err) => {
			debug!(target = "relay.probe", %addr, error = %err, "probe bind failed; treating port as free");
			false
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bound_port_is_in_use() {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();
		assert!(port_in_use("127.0.0.1", port));
	}

	#[test]
	fn released_port_is_free() {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let addr = listener.local_addr().unwrap();
		drop(listener);
		assert!(!addr_in_use(addr));
	}

	#[test]
	fn probe_does_not_hold_the_port() {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let addr = listener.local_addr().unwrap();
		drop(listener);

		assert!(!addr_in_use(addr));
		assert!(!addr_in_use(addr));
		TcpListener::bind(addr).unwrap();
	}

	#[test]
	fn unresolvable_host_reports_free() {
		assert!(!port_in_use("", 0));
	}
}
