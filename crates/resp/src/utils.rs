//! Utility functions and constants for RESP protocol.

use crate::error::ParseError;

/// CRLF line ending
pub const CRLF: &[u8] = b"\r\n";

/// Largest bulk payload accepted from a server (512 MiB, the server's own
/// proto-max-bulk-len default).
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Type markers for RESP2
pub const SIMPLE_STRING: u8 = b'+';
pub const ERROR: u8 = b'-';
pub const INTEGER: u8 = b':';
pub const BULK_STRING: u8 = b'$';
pub const ARRAY: u8 = b'*';

/// Type markers for RESP3
pub const NULL: u8 = b'_';
pub const BOOLEAN: u8 = b'#';
pub const DOUBLE: u8 = b',';
pub const BIG_NUMBER: u8 = b'(';
pub const BULK_ERROR: u8 = b'!';
pub const VERBATIM_STRING: u8 = b'=';
pub const MAP: u8 = b'%';
pub const SET: u8 = b'~';
pub const PUSH: u8 = b'>';

/// Look at the first CRLF-terminated line of `buf` without consuming it.
///
/// Returns the line (without CRLF) and the number of bytes it occupies
/// including the terminator, or `None` when no full line is buffered yet.
#[inline]
pub fn peek_line(buf: &[u8]) -> Result<Option<(&[u8], usize)>, ParseError> {
	match memchr::memchr(b'\n', buf) {
		Some(0) => Err(ParseError::Malformed(
			"Line not terminated by CRLF".to_string(),
		)),
		Some(pos) if buf[pos - 1] == b'\r' => Ok(Some((&buf[..pos - 1], pos + 1))),
		Some(_) => Err(ParseError::Malformed(
			"Line not terminated by CRLF".to_string(),
		)),
		None => Ok(None),
	}
}

/// Parse an integer from a byte slice
#[inline]
pub fn parse_integer(buf: &[u8]) -> Result<i64, ParseError> {
	let s = std::str::from_utf8(buf)
		.map_err(|_| ParseError::BadInteger(String::from_utf8_lossy(buf).into_owned()))?;
	s.parse::<i64>()
		.map_err(|e| ParseError::BadInteger(format!("{:?}: {}", s, e)))
}

/// Parse the length header of a bulk payload.
///
/// `-1` means null and is returned as `None` when `allow_null` is set.
#[inline]
pub fn parse_bulk_len(buf: &[u8], allow_null: bool) -> Result<Option<usize>, ParseError> {
	let length = parse_integer(buf)?;
	match length {
		-1 if allow_null => Ok(None),
		0..=MAX_BULK_LEN => Ok(Some(length as usize)),
		_ => Err(ParseError::BulkLength(length)),
	}
}

/// Parse the element count of an aggregate. `-1` means null.
#[inline]
pub fn parse_aggregate_len(buf: &[u8]) -> Result<Option<usize>, ParseError> {
	let length = parse_integer(buf)?;
	match length {
		-1 => Ok(None),
		0..=MAX_BULK_LEN => Ok(Some(length as usize)),
		_ => Err(ParseError::AggregateLength(length)),
	}
}

/// Parse a double from a byte slice
#[inline]
pub fn parse_double(buf: &[u8]) -> Result<f64, ParseError> {
	let s = std::str::from_utf8(buf)
		.map_err(|_| ParseError::BadDouble(String::from_utf8_lossy(buf).into_owned()))?;

	match s {
		"inf" => Ok(f64::INFINITY),
		"-inf" => Ok(f64::NEG_INFINITY),
		"nan" => Ok(f64::NAN),
		_ => s
			.parse::<f64>()
			.map_err(|e| ParseError::BadDouble(format!("{:?}: {}", s, e))),
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[test]
	fn test_peek_line() {
		assert_eq!(
			peek_line(b"hello\r\nworld").unwrap(),
			Some((&b"hello"[..], 7))
		);
		assert_eq!(peek_line(b"hello").unwrap(), None);
		assert_eq!(peek_line(b"hello\r").unwrap(), None);
		assert_eq!(peek_line(b"\r\n").unwrap(), Some((&b""[..], 2)));
	}

	#[test]
	fn test_peek_line_rejects_bare_lf() {
		assert!(peek_line(b"hello\nworld").is_err());
		assert!(peek_line(b"\n").is_err());
	}

	#[test]
	fn test_parse_integer() {
		assert_eq!(parse_integer(b"123").unwrap(), 123);
		assert_eq!(parse_integer(b"-456").unwrap(), -456);
		assert!(parse_integer(b"abc").is_err());
		assert!(parse_integer(b"").is_err());
	}

	#[rstest]
	#[case(b"0", true, Ok(Some(0)))]
	#[case(b"5", false, Ok(Some(5)))]
	#[case(b"-1", true, Ok(None))]
	#[case(b"-1", false, Err(ParseError::BulkLength(-1)))]
	#[case(b"-2", true, Err(ParseError::BulkLength(-2)))]
	#[case(b"536870913", true, Err(ParseError::BulkLength(536870913)))]
	fn test_parse_bulk_len(
		#[case] input: &[u8],
		#[case] allow_null: bool,
		#[case] expected: Result<Option<usize>, ParseError>,
	) {
		assert_eq!(parse_bulk_len(input, allow_null), expected);
	}

	#[test]
	fn test_parse_aggregate_len() {
		assert_eq!(parse_aggregate_len(b"3").unwrap(), Some(3));
		assert_eq!(parse_aggregate_len(b"-1").unwrap(), None);
		assert_eq!(
			parse_aggregate_len(b"-7"),
			Err(ParseError::AggregateLength(-7))
		);
	}

	#[test]
	fn test_parse_double() {
		assert_eq!(parse_double(b"3.14").unwrap(), 3.14);
		assert_eq!(parse_double(b"-2.5").unwrap(), -2.5);
		assert_eq!(parse_double(b"inf").unwrap(), f64::INFINITY);
		assert_eq!(parse_double(b"-inf").unwrap(), f64::NEG_INFINITY);
		assert!(parse_double(b"nan").unwrap().is_nan());
		assert!(parse_double(b"x1").is_err());
	}
}
