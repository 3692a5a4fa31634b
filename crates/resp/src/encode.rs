//! RESP encoding.
//!
//! Commands go out as arrays of bulk strings through [`encode_command`].
//! [`RespEncoder`] writes any [`RespValue`] and is what a server (or a test
//! double of one) uses to answer.

use std::collections::HashMap;
use std::collections::HashSet;

use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;
use thiserror::Error;

use crate::RespValue;
use crate::utils::*;

/// Errors that can occur during RESP encoding.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
	/// Verbatim format tags are exactly three bytes
	#[error("Invalid verbatim format: {0:?}")]
	InvalidVerbatimFormat(Bytes),

	/// Simple strings and errors cannot carry line breaks
	#[error("Line break in {0} payload")]
	LineBreak(&'static str),
}

/// Write a command as an array of bulk strings.
///
/// Every argument is length-prefixed, so arguments may contain any bytes,
/// including CR, LF and NUL.
pub fn encode_command<A: AsRef<[u8]>>(args: &[A], buf: &mut BytesMut) {
	let payload: usize = args.iter().map(|a| a.as_ref().len() + 16).sum();
	buf.reserve(payload + 16);

	encode_length(buf, ARRAY, args.len());
	for arg in args {
		encode_bulk_string(buf, arg.as_ref());
	}
}

/// Trait for encoding RESP values.
pub trait RespEncoder {
	fn encode_to(&self, buf: &mut BytesMut) -> Result<(), EncodeError>;

	fn encode(&self) -> Result<Bytes, EncodeError> {
		let mut buf = BytesMut::new();
		self.encode_to(&mut buf)?;
		Ok(buf.freeze())
	}
}

impl RespEncoder for RespValue {
	fn encode_to(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
		match self {
			RespValue::SimpleString(s) => encode_line(buf, SIMPLE_STRING, s, "simple string")?,
			RespValue::Error(e) => encode_line(buf, ERROR, e, "error")?,
			RespValue::Integer(i) => encode_integer(buf, *i),
			RespValue::BulkString(s) => encode_bulk_string(buf, s),
			RespValue::Array(arr) => encode_sequence(buf, ARRAY, arr)?,
			RespValue::Null => encode_null(buf),
			RespValue::Boolean(b) => encode_boolean(buf, *b),
			RespValue::Double(d) => encode_double(buf, *d),
			RespValue::BigNumber(n) => encode_line(buf, BIG_NUMBER, n, "big number")?,
			RespValue::BulkError(e) => {
				encode_length(buf, BULK_ERROR, e.len());
				buf.put_slice(e);
				buf.put_slice(CRLF);
			}
			RespValue::VerbatimString { format, data } => {
				encode_verbatim_string(buf, format, data)?
			}
			RespValue::Map(m) => encode_map(buf, m)?,
			RespValue::Set(s) => encode_set(buf, s)?,
			RespValue::Push(p) => encode_sequence(buf, PUSH, p)?,
		}
		Ok(())
	}
}

#[inline]
fn encode_line(
	buf: &mut BytesMut,
	marker: u8,
	s: &[u8],
	what: &'static str,
) -> Result<(), EncodeError> {
	if memchr::memchr2(b'\r', b'\n', s).is_some() {
		return Err(EncodeError::LineBreak(what));
	}
	buf.put_u8(marker);
	buf.put_slice(s);
	buf.put_slice(CRLF);
	Ok(())
}

#[inline]
fn encode_integer(buf: &mut BytesMut, i: i64) {
	buf.put_u8(INTEGER);
	buf.put_slice(i.to_string().as_bytes());
	buf.put_slice(CRLF);
}

#[inline]
fn encode_length(buf: &mut BytesMut, marker: u8, length: usize) {
	buf.put_u8(marker);
	buf.put_slice(length.to_string().as_bytes());
	buf.put_slice(CRLF);
}

#[inline]
fn encode_bulk_string(buf: &mut BytesMut, s: &[u8]) {
	encode_length(buf, BULK_STRING, s.len());
	buf.put_slice(s);
	buf.put_slice(CRLF);
}

#[inline]
fn encode_null(buf: &mut BytesMut) {
	buf.put_u8(NULL);
	buf.put_slice(CRLF);
}

#[inline]
fn encode_boolean(buf: &mut BytesMut, b: bool) {
	buf.put_u8(BOOLEAN);
	buf.put_u8(if b { b't' } else { b'f' });
	buf.put_slice(CRLF);
}

#[inline]
fn encode_double(buf: &mut BytesMut, d: f64) {
	buf.put_u8(DOUBLE);
	if d.is_nan() {
		buf.put_slice(b"nan");
	} else if d.is_infinite() {
		buf.put_slice(if d.is_sign_positive() {
			&b"inf"[..]
		} else {
			&b"-inf"[..]
		});
	} else {
		buf.put_slice(d.to_string().as_bytes());
	}
	buf.put_slice(CRLF);
}

fn encode_verbatim_string(
	buf: &mut BytesMut,
	format: &Bytes,
	data: &Bytes,
) -> Result<(), EncodeError> {
	if format.len() != 3 {
		return Err(EncodeError::InvalidVerbatimFormat(format.clone()));
	}
	encode_length(buf, VERBATIM_STRING, 4 + data.len());
	buf.put_slice(format);
	buf.put_u8(b':');
	buf.put_slice(data);
	buf.put_slice(CRLF);
	Ok(())
}

fn encode_sequence(buf: &mut BytesMut, marker: u8, items: &[RespValue]) -> Result<(), EncodeError> {
	encode_length(buf, marker, items.len());
	for value in items {
		value.encode_to(buf)?;
	}
	Ok(())
}

fn encode_map(buf: &mut BytesMut, map: &HashMap<RespValue, RespValue>) -> Result<(), EncodeError> {
	encode_length(buf, MAP, map.len());
	for (key, value) in map {
		key.encode_to(buf)?;
		value.encode_to(buf)?;
	}
	Ok(())
}

fn encode_set(buf: &mut BytesMut, set: &HashSet<RespValue>) -> Result<(), EncodeError> {
	encode_length(buf, SET, set.len());
	for value in set {
		value.encode_to(buf)?;
	}
	Ok(())
}
