//! Streaming RESP reply parser.
//!
//! Bytes arrive from the socket in arbitrary chunks. The parser consumes
//! whole scalars from the buffer as soon as they are complete and keeps
//! partially built aggregates on an explicit frame stack, so a reply split
//! across many reads is never re-scanned from the start.

use std::collections::HashMap;
use std::collections::HashSet;

use bytes::Buf;
use bytes::Bytes;
use bytes::BytesMut;

use crate::error::ParseError;
use crate::types::RespValue;
use crate::utils::*;

/// Result of a parsing attempt.
#[derive(Debug)]
pub enum RespParseResult {
	/// A complete RESP value was parsed.
	Complete(RespValue),
	/// The buffer does not contain enough data to parse a complete value.
	Incomplete,
	/// The input is malformed; the stream cannot be resynchronized.
	Error(ParseError),
}

/// A stateful RESP parser that supports streaming.
#[derive(Debug, Default)]
pub struct RespParser {
	frames: Vec<Frame>,
}

#[derive(Debug)]
enum Frame {
	Array {
		expected: usize,
		elements: Vec<RespValue>,
	},
	Map {
		expected: usize,
		elements: HashMap<RespValue, RespValue>,
		key: Option<RespValue>,
	},
	Set {
		expected: usize,
		elements: HashSet<RespValue>,
	},
	Push {
		expected: usize,
		elements: Vec<RespValue>,
	},
}

enum ParsedItem {
	Value(RespValue),
	FramePushed,
}

enum Aggregate {
	Array,
	Map,
	Set,
	Push,
}

impl RespParser {
	pub fn new() -> Self {
		Self::default()
	}

	/// Whether an aggregate reply has been partially consumed.
	pub fn in_progress(&self) -> bool {
		!self.frames.is_empty()
	}

	/// Drop any partially built reply.
	pub fn reset(&mut self) {
		self.frames.clear();
	}

	/// Parse one RESP value from `buf`.
	///
	/// Consumed bytes are removed from `buf`. `Incomplete` leaves the
	/// unconsumed tail in place; call again after appending more input.
	pub fn parse(&mut self, buf: &mut BytesMut) -> RespParseResult {
		loop {
			match self.parse_step(buf) {
				Ok(Some(ParsedItem::FramePushed)) => continue,
				Ok(Some(ParsedItem::Value(val))) => match self.absorb(val) {
					Ok(Some(complete)) => return RespParseResult::Complete(complete),
					Ok(None) => continue,
					Err(e) => return RespParseResult::Error(e),
				},
				Ok(None) => return RespParseResult::Incomplete,
				Err(e) => return RespParseResult::Error(e),
			}
		}
	}

	/// Push a finished value into the innermost open aggregate. Returns the
	/// root value once the outermost aggregate (or a bare scalar) completes.
	fn absorb(&mut self, mut value: RespValue) -> Result<Option<RespValue>, ParseError> {
		loop {
			let Some(frame) = self.frames.last_mut() else {
				return Ok(Some(value));
			};

			let finished = match frame {
				Frame::Array { expected, elements } => {
					elements.push(value);
					*expected -= 1;
					(*expected == 0).then(|| RespValue::Array(std::mem::take(elements)))
				}
				Frame::Push { expected, elements } => {
					elements.push(value);
					*expected -= 1;
					(*expected == 0).then(|| RespValue::Push(std::mem::take(elements)))
				}
				Frame::Set { expected, elements } => {
					elements.insert(value);
					*expected -= 1;
					(*expected == 0).then(|| RespValue::Set(std::mem::take(elements)))
				}
				Frame::Map {
					expected,
					elements,
					key,
				} => {
					match key.take() {
						Some(k) => {
							elements.insert(k, value);
							*expected -= 1;
						}
						None => *key = Some(value),
					}
					(*expected == 0).then(|| RespValue::Map(std::mem::take(elements)))
				}
			};

			match finished {
				Some(done) => {
					self.frames.pop();
					value = done;
				}
				None => return Ok(None),
			}
		}
	}

	/// Tries to parse the next token.
	/// A scalar is returned as `Value`; an aggregate header pushes a frame.
	/// Returns `Ok(None)` if the buffer holds only part of the token.
	fn parse_step(&mut self, buf: &mut BytesMut) -> Result<Option<ParsedItem>, ParseError> {
		if buf.is_empty() {
			return Ok(None);
		}

		match buf[0] {
			SIMPLE_STRING => Self::parse_line(buf, |line| {
				Ok(RespValue::SimpleString(Bytes::copy_from_slice(line)))
			}),
			ERROR => Self::parse_line(buf, |line| {
				Ok(RespValue::Error(Bytes::copy_from_slice(line)))
			}),
			INTEGER => Self::parse_line(buf, |line| Ok(RespValue::Integer(parse_integer(line)?))),
			DOUBLE => Self::parse_line(buf, |line| Ok(RespValue::Double(parse_double(line)?))),
			BIG_NUMBER => Self::parse_line(buf, |line| {
				Ok(RespValue::BigNumber(Bytes::copy_from_slice(line)))
			}),
			BOOLEAN => Self::parse_line(buf, |line| match line {
				b"t" => Ok(RespValue::Boolean(true)),
				b"f" => Ok(RespValue::Boolean(false)),
				_ => Err(ParseError::Malformed(
					"Boolean must be 't' or 'f'".to_string(),
				)),
			}),
			NULL => Self::parse_line(buf, |line| {
				if line.is_empty() {
					Ok(RespValue::Null)
				} else {
					Err(ParseError::Malformed("Null must be empty".to_string()))
				}
			}),
			BULK_STRING => Self::parse_bulk(buf, true, |data| Ok(RespValue::BulkString(data))),
			BULK_ERROR => Self::parse_bulk(buf, false, |data| Ok(RespValue::BulkError(data))),
			VERBATIM_STRING => Self::parse_bulk(buf, false, |data| {
				if data.len() < 4 || data[3] != b':' {
					return Err(ParseError::Malformed(
						"Verbatim string must have format prefix".to_string(),
					));
				}
				Ok(RespValue::VerbatimString {
					format: data.slice(0..3),
					data: data.slice(4..),
				})
			}),

			ARRAY => self.start_aggregate(buf, Aggregate::Array),
			MAP => self.start_aggregate(buf, Aggregate::Map),
			SET => self.start_aggregate(buf, Aggregate::Set),
			PUSH => self.start_aggregate(buf, Aggregate::Push),

			other => Err(ParseError::UnknownType(other)),
		}
	}

	/// `<tag><content>\r\n`
	fn parse_line(
		buf: &mut BytesMut,
		build: impl FnOnce(&[u8]) -> Result<RespValue, ParseError>,
	) -> Result<Option<ParsedItem>, ParseError> {
		let Some((line, total_len)) = peek_line(&buf[1..])? else {
			return Ok(None);
		};
		let value = build(line)?;
		buf.advance(1 + total_len);
		Ok(Some(ParsedItem::Value(value)))
	}

	/// `<tag><len>\r\n<len bytes>\r\n`; `$-1\r\n` is null when allowed.
	fn parse_bulk(
		buf: &mut BytesMut,
		allow_null: bool,
		build: impl FnOnce(Bytes) -> Result<RespValue, ParseError>,
	) -> Result<Option<ParsedItem>, ParseError> {
		let Some((line, len_consumed)) = peek_line(&buf[1..])? else {
			return Ok(None);
		};

		let Some(length) = parse_bulk_len(line, allow_null)? else {
			buf.advance(1 + len_consumed);
			return Ok(Some(ParsedItem::Value(RespValue::Null)));
		};

		let total_needed = 1 + len_consumed + length + CRLF.len();
		if buf.len() < total_needed {
			buf.reserve(total_needed - buf.len());
			return Ok(None);
		}

		if &buf[total_needed - 2..total_needed] != CRLF {
			return Err(ParseError::Malformed(
				"Missing CRLF after bulk payload".to_string(),
			));
		}

		buf.advance(1 + len_consumed);
		let data = buf.split_to(length).freeze();
		buf.advance(CRLF.len());

		Ok(Some(ParsedItem::Value(build(data)?)))
	}

	fn start_aggregate(
		&mut self,
		buf: &mut BytesMut,
		kind: Aggregate,
	) -> Result<Option<ParsedItem>, ParseError> {
		let Some((line, total_len)) = peek_line(&buf[1..])? else {
			return Ok(None);
		};
		let length = parse_aggregate_len(line)?;
		buf.advance(1 + total_len);

		let Some(length) = length else {
			return Ok(Some(ParsedItem::Value(RespValue::Null)));
		};

		if length == 0 {
			let empty = match kind {
				Aggregate::Array => RespValue::Array(Vec::new()),
				Aggregate::Map => RespValue::Map(HashMap::new()),
				Aggregate::Set => RespValue::Set(HashSet::new()),
				Aggregate::Push => RespValue::Push(Vec::new()),
			};
			return Ok(Some(ParsedItem::Value(empty)));
		}

		// Cap preallocation; the count comes from the peer.
		let capacity = length.min(1024);
		self.frames.push(match kind {
			Aggregate::Array => Frame::Array {
				expected: length,
				elements: Vec::with_capacity(capacity),
			},
			Aggregate::Map => Frame::Map {
				expected: length,
				elements: HashMap::with_capacity(capacity),
				key: None,
			},
			Aggregate::Set => Frame::Set {
				expected: length,
				elements: HashSet::with_capacity(capacity),
			},
			Aggregate::Push => Frame::Push {
				expected: length,
				elements: Vec::with_capacity(capacity),
			},
		});
		Ok(Some(ParsedItem::FramePushed))
	}
}

/// Convenience function for one-off parsing of a fully buffered value.
///
/// A truncated value is reported as `Truncated`. Use `RespParser`
/// directly when input arrives incrementally.
pub fn parse(buf: &mut BytesMut) -> Result<RespValue, ParseError> {
	let mut parser = RespParser::new();
	match parser.parse(buf) {
		RespParseResult::Complete(val) => Ok(val),
		RespParseResult::Incomplete => Err(ParseError::Truncated),
		RespParseResult::Error(e) => Err(e),
	}
}
