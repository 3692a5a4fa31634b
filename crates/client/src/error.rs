use std::io;
use std::sync::Arc;
use std::time::Duration;

use resp::ParseError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by [`Conn`](crate::Conn) and [`Dialer`](crate::Dialer).
///
/// `Clone` so that the first fatal error of a connection can be latched and
/// handed to every later caller.
#[derive(Error, Debug, Clone)]
pub enum Error {
	/// The connection was closed locally.
	#[error("connection closed")]
	Closed,

	#[error("I/O error: {0}")]
	Io(Arc<io::Error>),

	/// The server sent bytes that are not valid RESP.
	#[error("protocol error: {0}")]
	Protocol(#[from] ParseError),

	/// An error reply from the server, verbatim.
	#[error("{0}")]
	Server(String),

	#[error("cannot convert {got} reply into {expected}")]
	Convert { expected: &'static str, got: String },

	#[error("invalid address: {0}")]
	InvalidAddress(String),

	#[error("dial timed out after {0:?}")]
	Timeout(Duration),

	#[error("TLS error: {0}")]
	Tls(String),
}

impl Error {
	/// Whether this error leaves the byte stream unusable.
	///
	/// Fatal errors kill the connection. Server replies and failed
	/// conversions do not.
	pub fn is_fatal(&self) -> bool {
		matches!(self, Error::Closed | Error::Io(_) | Error::Protocol(_))
	}

	pub(crate) fn convert(expected: &'static str, got: impl Into<String>) -> Self {
		Error::Convert {
			expected,
			got: got.into(),
		}
	}
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Self {
		Error::Io(Arc::new(e))
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case(Error::Closed, true)]
	#[case(Error::from(io::Error::from(io::ErrorKind::UnexpectedEof)), true)]
	#[case(Error::Protocol(ParseError::UnknownType(b'?')), true)]
	#[case(Error::Server("ERR nope".into()), false)]
	#[case(Error::convert("integer", "bulk string"), false)]
	#[case(Error::Timeout(Duration::from_secs(1)), false)]
	fn test_is_fatal(#[case] err: Error, #[case] fatal: bool) {
		assert_eq!(err.is_fatal(), fatal);
	}

	#[test]
	fn test_server_error_displays_verbatim() {
		let text = "WRONGPASS invalid username-password pair or user is disabled.";
		assert_eq!(Error::Server(text.to_string()).to_string(), text);
	}
}
