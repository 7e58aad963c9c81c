//! Newline-delimited text framing.
//!
//! Used for both directions of the data plane and as the outer framing of the
//! control plane. Unlike a naive per-read `split('\n')`, the decoder keeps a
//! partial line buffered until its terminator arrives, so a URL split across
//! TCP segments is still delivered whole.
//!
//! Overlong lines are skipped silently by default. [`LineCodec::strict`]
//! reports them as an [`io::ErrorKind::InvalidData`] error wrapping
//! [`LineTooLong`] so a request/response peer can answer instead of stalling.

use std::{cmp, io};

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Longest line the decoder will buffer before discarding it.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// A line exceeded the decoder's maximum length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("line longer than {max} bytes")]
pub struct LineTooLong {
	pub max: usize,
}

impl LineTooLong {
	/// Returns the overflow carried by `err`, if that is what it is.
	pub fn from_io(err: &io::Error) -> Option<Self> {
		err.get_ref()?.downcast_ref::<Self>().copied()
	}
}

/// `\n`-terminated UTF-8 line codec.
///
/// Decoding strips an optional trailing `\r`, replaces invalid UTF-8 with
/// U+FFFD, drops lines longer than the configured maximum, and yields an
/// unterminated final line at end of stream.
#[derive(Debug, Clone)]
pub struct LineCodec {
	/// Bytes of the buffer already scanned for a newline.
	next_index: usize,
	max_length: usize,
	/// Set while skipping the remainder of an overlong line.
	discarding: bool,
	strict: bool,
}

impl LineCodec {
	pub fn new() -> Self {
		Self::with_max_length(MAX_LINE_LENGTH)
	}

	pub fn with_max_length(max_length: usize) -> Self {
		Self {
			next_index: 0,
			max_length,
			discarding: false,
			strict: false,
		}
	}

	/// Like [`new`](Self::new), but an overlong line yields an error once
	/// before its remainder is skipped.
	pub fn strict() -> Self {
		Self {
			strict: true,
			..Self::new()
		}
	}
}

impl Default for LineCodec {
	fn default() -> Self {
		Self::new()
	}
}

fn decode_line(bytes: &[u8]) -> String {
	let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
	String::from_utf8_lossy(bytes).into_owned()
}

impl Decoder for LineCodec {
	type Item = String;
	type Error = io::Error;

	fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
		loop {
			let read_to = cmp::min(self.max_length.saturating_add(1), buf.len());
			let newline = buf[self.next_index..read_to].iter().position(|b| *b == b'\n');

			match (self.discarding, newline) {
				(true, Some(offset)) => {
					buf.advance(self.next_index + offset + 1);
					self.discarding = false;
					self.next_index = 0;
				}
				(true, None) => {
					buf.advance(read_to);
					self.next_index = 0;
					if buf.is_empty() {
						return Ok(None);
					}
				}
				(false, Some(offset)) => {
					let end = self.next_index + offset;
					self.next_index = 0;
					let line = buf.split_to(end + 1);
					return Ok(Some(decode_line(&line[..end])));
				}
				(false, None) if buf.len() > self.max_length => {
					self.discarding = true;
					if self.strict {
						return Err(io::Error::new(
							io::ErrorKind::InvalidData,
							LineTooLong { max: self.max_length },
						));
					}
				}
				(false, None) => {
					self.next_index = read_to;
					return Ok(None);
				}
			}
		}
	}

	fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
		if let Some(line) = self.decode(buf)? {
			return Ok(Some(line));
		}

		self.next_index = 0;
		if buf.is_empty() || self.discarding {
			buf.clear();
			self.discarding = false;
			return Ok(None);
		}

		let line = buf.split_to(buf.len());
		Ok(Some(decode_line(&line)))
	}
}

impl<T> Encoder<T> for LineCodec
where
	T: AsRef<str>,
{
	type Error = io::Error;

	fn encode(&mut self, line: T, buf: &mut BytesMut) -> Result<(), io::Error> {
		let line = line.as_ref();
		buf.reserve(line.len() + 1);
		buf.put_slice(line.as_bytes());
		buf.put_u8(b'\n');
		Ok(())
	}
}
