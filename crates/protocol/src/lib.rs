//! Wire types shared by every browser relay process.
//!
//! Two planes meet here:
//!
//! - **Data plane**: newline-delimited UTF-8 pushed from the relay to each
//!   browser client over TCP ([`LineCodec`]).
//! - **Control plane**: newline-delimited JSON exchanged over the same-host
//!   control socket ([`ControlRequest`], [`ControlResponse`]).

pub mod control;
pub mod line;
pub mod url;

pub use control::{ControlRequest, ControlResponse};
pub use line::{LineCodec, LineTooLong, MAX_LINE_LENGTH};
pub use url::is_url;

/// Literal reply sent to a browser client that writes anything upstream.
pub const DATA_ACK: &str = "Data received";
