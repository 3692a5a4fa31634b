//! Protocol errors raised while decoding replies.

use thiserror::Error;

/// A reply that cannot be decoded.
///
/// The read position in the stream is lost after any of these, so the
/// connection that produced it has to be discarded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
	#[error("reply truncated by end of stream")]
	Truncated,

	#[error("unknown reply type byte 0x{0:02x}")]
	UnknownType(u8),

	#[error("malformed reply: {0}")]
	Malformed(String),

	#[error("bad integer {0}")]
	BadInteger(String),

	#[error("bad double {0}")]
	BadDouble(String),

	#[error("bulk length {0} out of range")]
	BulkLength(i64),

	#[error("aggregate length {0} out of range")]
	AggregateLength(i64),
}
