//! Control-plane messages exchanged over the relay's local socket.
//!
//! A short-lived process connects, writes one [`ControlRequest`] as a JSON
//! line, reads one [`ControlResponse`] line, and disconnects:
//!
//! 1. `browser-relay <url>` sends [`ControlRequest::Message`] and receives
//!    [`ControlResponse::Delivered`] or [`ControlResponse::Ignored`]
//! 2. `browser-relay --status` sends [`ControlRequest::Status`]
//! 3. `browser-relay --stop` sends [`ControlRequest::Shutdown`]

use serde::{Deserialize, Serialize};

/// Request sent from a local process to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
	/// Hand a URL to the relay for broadcast.
	Message {
		/// Opaque text; broadcast only if it passes [`crate::is_url`].
		payload: String,
	},
	Ping,
	Status,
	Shutdown,
}

/// Reply written by the relay for every [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlResponse {
	/// The payload was queued to `clients` downstream connections.
	Delivered { clients: usize },
	/// The payload failed the URL check and was dropped.
	Ignored,
	Pong,
	Status {
		/// Number of browser clients currently registered.
		clients: usize,
		/// Transport address the relay is listening on, if bound.
		addr: Option<String>,
	},
	Ok,
	Error { message: String },
}

macro_rules! json_line {
	($ty:ty) => {
		impl $ty {
			/// Serialize to a single JSON line without the trailing newline.
			pub fn to_line(&self) -> serde_json::Result<String> {
				serde_json::to_string(self)
			}

			/// Parse from one line, ignoring surrounding whitespace.
			pub fn from_line(line: &str) -> serde_json::Result<Self> {
				serde_json::from_str(line.trim())
			}
		}
	};
}

json_line!(ControlRequest);
json_line!(ControlResponse);

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn message_request_wire_shape() {
		let request = ControlRequest::Message {
			payload: "https://example.com/test".to_string(),
		};
		let line = request.to_line().unwrap();
		assert_eq!(line, r#"{"type":"message","payload":"https://example.com/test"}"#);
	}

	#[test]
	fn unit_requests_are_tagged() {
		assert_eq!(ControlRequest::Ping.to_line().unwrap(), r#"{"type":"ping"}"#);
		assert_eq!(ControlRequest::from_line("{\"type\":\"shutdown\"}\n").unwrap(), ControlRequest::Shutdown);
	}

	#[test]
	fn status_response_without_addr() {
		let parsed = ControlResponse::from_line(r#"{"type":"status","clients":3,"addr":null}"#).unwrap();
		assert_eq!(parsed, ControlResponse::Status { clients: 3, addr: None });
	}

	#[test]
	fn unknown_request_type_is_rejected() {
		assert!(ControlRequest::from_line(r#"{"type":"reboot"}"#).is_err());
		assert!(ControlRequest::from_line("https://example.com").is_err());
	}
}
