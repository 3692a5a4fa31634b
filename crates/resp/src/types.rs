//! RESP reply values.

use std::collections::HashMap;
use std::collections::HashSet;

use bytes::Bytes;

/// One decoded RESP value.
///
/// Covers the RESP2 types plus the RESP3 extensions a server may answer
/// with once the connection speaks protocol 3.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
	// RESP2 types
	/// Simple string: `+OK\r\n`
	SimpleString(Bytes),

	/// Error: `-ERR message\r\n`
	Error(Bytes),

	/// Integer: `:1000\r\n`
	Integer(i64),

	/// Bulk string: `$6\r\nfoobar\r\n`
	BulkString(Bytes),

	/// Array: `*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n`
	Array(Vec<RespValue>),

	/// Null: `$-1\r\n`, `*-1\r\n` (RESP2) or `_\r\n` (RESP3)
	Null,

	// RESP3 types
	/// Boolean: `#t\r\n` or `#f\r\n`
	Boolean(bool),

	/// Double: `,3.14\r\n`
	Double(f64),

	/// Big number: `(3492890328409238509324850943850943825024385\r\n`
	BigNumber(Bytes),

	/// Bulk error: `!21\r\nSYNTAX invalid syntax\r\n`
	BulkError(Bytes),

	/// Verbatim string: `=15\r\ntxt:Some string\r\n`
	VerbatimString { format: Bytes, data: Bytes },

	/// Map: `%2\r\n+first\r\n:1\r\n+second\r\n:2\r\n`
	Map(HashMap<RespValue, RespValue>),

	/// Set: `~2\r\n+orange\r\n+apple\r\n`
	Set(HashSet<RespValue>),

	/// Push: `>2\r\n+pubsub\r\n+message\r\n`
	Push(Vec<RespValue>),
}

impl RespValue {
	/// Short name of the variant, used in conversion errors and logs.
	pub fn kind(&self) -> &'static str {
		match self {
			RespValue::SimpleString(_) => "simple string",
			RespValue::Error(_) => "error",
			RespValue::Integer(_) => "integer",
			RespValue::BulkString(_) => "bulk string",
			RespValue::Array(_) => "array",
			RespValue::Null => "null",
			RespValue::Boolean(_) => "boolean",
			RespValue::Double(_) => "double",
			RespValue::BigNumber(_) => "big number",
			RespValue::BulkError(_) => "bulk error",
			RespValue::VerbatimString { .. } => "verbatim string",
			RespValue::Map(_) => "map",
			RespValue::Set(_) => "set",
			RespValue::Push(_) => "push",
		}
	}

	/// Check if the value is a server error reply
	pub fn is_error(&self) -> bool {
		matches!(self, RespValue::Error(_) | RespValue::BulkError(_))
	}

	/// Check if the value is null
	pub fn is_null(&self) -> bool {
		matches!(self, RespValue::Null)
	}

	/// The message carried by an error reply, exactly as the server sent it.
	pub fn error_message(&self) -> Option<String> {
		match self {
			RespValue::Error(e) | RespValue::BulkError(e) => {
				Some(String::from_utf8_lossy(e).into_owned())
			}
			_ => None,
		}
	}

	/// Try to convert to a string slice
	pub fn as_str(&self) -> Option<&str> {
		match self {
			RespValue::SimpleString(s) | RespValue::BulkString(s) => std::str::from_utf8(s).ok(),
			RespValue::VerbatimString { data, .. } => std::str::from_utf8(data).ok(),
			_ => None,
		}
	}

	/// Try to convert to bytes
	pub fn as_bytes(&self) -> Option<&Bytes> {
		match self {
			RespValue::SimpleString(b) | RespValue::BulkString(b) => Some(b),
			RespValue::VerbatimString { data, .. } => Some(data),
			_ => None,
		}
	}

	/// Try to convert to integer
	pub fn as_integer(&self) -> Option<i64> {
		match self {
			RespValue::Integer(i) => Some(*i),
			_ => None,
		}
	}

	/// Try to convert to array
	pub fn as_array(&self) -> Option<&Vec<RespValue>> {
		match self {
			RespValue::Array(a) => Some(a),
			_ => None,
		}
	}

	/// Convert to String with lossy UTF-8 conversion
	pub fn to_string_lossy(&self) -> Option<String> {
		self.as_bytes()
			.map(|s| String::from_utf8_lossy(s).into_owned())
	}

	/// Try to consume and convert to Vec<RespValue>
	pub fn into_vec(self) -> Option<Vec<RespValue>> {
		match self {
			RespValue::Array(a) | RespValue::Push(a) => Some(a),
			RespValue::Set(s) => Some(s.into_iter().collect()),
			_ => None,
		}
	}

	/// Create a simple string value
	pub fn simple_string(s: impl Into<Bytes>) -> Self {
		RespValue::SimpleString(s.into())
	}

	/// Create a bulk string value
	pub fn bulk_string(s: impl Into<Bytes>) -> Self {
		RespValue::BulkString(s.into())
	}

	/// Create an error value
	pub fn error(e: impl Into<Bytes>) -> Self {
		RespValue::Error(e.into())
	}

	/// Create an array value from an iterator
	pub fn array(items: impl IntoIterator<Item = RespValue>) -> Self {
		RespValue::Array(items.into_iter().collect())
	}
}

// Set members and map keys are usually strings or integers; aggregates only
// hash their discriminant.
impl std::hash::Hash for RespValue {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		match self {
			RespValue::SimpleString(s) | RespValue::BulkString(s) => {
				0u8.hash(state);
				s.hash(state);
			}
			RespValue::Error(e) => {
				1u8.hash(state);
				e.hash(state);
			}
			RespValue::Integer(i) => {
				2u8.hash(state);
				i.hash(state);
			}
			RespValue::Null => 3u8.hash(state),
			RespValue::Boolean(b) => {
				4u8.hash(state);
				b.hash(state);
			}
			RespValue::Double(d) => {
				5u8.hash(state);
				d.to_bits().hash(state);
			}
			RespValue::BigNumber(n) => {
				6u8.hash(state);
				n.hash(state);
			}
			RespValue::BulkError(e) => {
				7u8.hash(state);
				e.hash(state);
			}
			RespValue::VerbatimString { format, data } => {
				8u8.hash(state);
				format.hash(state);
				data.hash(state);
			}
			RespValue::Array(_) | RespValue::Map(_) | RespValue::Set(_) | RespValue::Push(_) => {
				std::mem::discriminant(self).hash(state);
			}
		}
	}
}

impl Eq for RespValue {}

impl From<&str> for RespValue {
	fn from(s: &str) -> Self {
		RespValue::BulkString(Bytes::copy_from_slice(s.as_bytes()))
	}
}

impl From<String> for RespValue {
	fn from(s: String) -> Self {
		RespValue::BulkString(Bytes::from(s))
	}
}

impl From<Bytes> for RespValue {
	fn from(b: Bytes) -> Self {
		RespValue::BulkString(b)
	}
}

impl From<i64> for RespValue {
	fn from(i: i64) -> Self {
		RespValue::Integer(i)
	}
}

impl<T: Into<RespValue>> From<Option<T>> for RespValue {
	fn from(o: Option<T>) -> Self {
		match o {
			Some(v) => v.into(),
			None => RespValue::Null,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_is_error() {
		assert!(RespValue::error("ERR").is_error());
		assert!(RespValue::BulkError(Bytes::from("SYNTAX bad")).is_error());
		assert!(!RespValue::simple_string("OK").is_error());
	}

	#[test]
	fn test_error_message_is_verbatim() {
		let err = RespValue::error("WRONGPASS invalid username-password pair");
		assert_eq!(
			err.error_message().as_deref(),
			Some("WRONGPASS invalid username-password pair")
		);
		assert_eq!(RespValue::Integer(1).error_message(), None);
	}

	#[test]
	fn test_as_str() {
		assert_eq!(RespValue::simple_string("hello").as_str(), Some("hello"));
		assert_eq!(RespValue::Integer(42).as_str(), None);

		let verbatim = RespValue::VerbatimString {
			format: Bytes::from("txt"),
			data: Bytes::from("body"),
		};
		assert_eq!(verbatim.as_str(), Some("body"));
	}

	#[test]
	fn test_kind() {
		assert_eq!(RespValue::Null.kind(), "null");
		assert_eq!(RespValue::array(vec![]).kind(), "array");
		assert_eq!(RespValue::Double(1.5).kind(), "double");
	}

	#[test]
	fn test_from_option() {
		let none: RespValue = Option::<&str>::None.into();
		assert!(none.is_null());

		let some: RespValue = Some("x").into();
		assert_eq!(some.as_str(), Some("x"));
	}

	#[test]
	fn test_into_vec() {
		let arr = RespValue::array(vec![RespValue::Integer(1), RespValue::Integer(2)]);
		assert_eq!(arr.into_vec().map(|v| v.len()), Some(2));
		assert_eq!(RespValue::Null.into_vec(), None);
	}
}
