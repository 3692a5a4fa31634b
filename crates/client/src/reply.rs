//! Conversion of decoded replies into caller types.
//!
//! The connection turns a top-level error reply into [`Error::Server`] before
//! conversion runs, so implementations only meet error values nested inside
//! aggregates.

use std::collections::HashMap;
use std::hash::Hash;
use std::str::FromStr;

use bytes::Bytes;
use resp::RespValue;

use crate::Error;
use crate::Result;

/// A type a reply can be decoded into.
///
/// `Null` converts only into `Option<T>` and `()`; every other target
/// reports it as a conversion error.
pub trait FromResp: Sized {
	fn from_resp(value: RespValue) -> Result<Self>;
}

fn reject(expected: &'static str, value: RespValue) -> Error {
	match value.error_message() {
		Some(msg) => Error::Server(msg),
		None => Error::convert(expected, value.kind()),
	}
}

/// Payload bytes of any textual reply.
fn into_text(value: RespValue, expected: &'static str) -> Result<Bytes> {
	match value {
		RespValue::SimpleString(b) | RespValue::BulkString(b) | RespValue::BigNumber(b) => Ok(b),
		RespValue::VerbatimString { data, .. } => Ok(data),
		RespValue::Integer(i) => Ok(Bytes::from(i.to_string())),
		RespValue::Double(d) => Ok(Bytes::from(d.to_string())),
		other => Err(reject(expected, other)),
	}
}

fn parse_text<T: FromStr>(bytes: &[u8], expected: &'static str) -> Result<T> {
	std::str::from_utf8(bytes)
		.ok()
		.and_then(|s| s.parse().ok())
		.ok_or_else(|| Error::convert(expected, format!("{:?}", String::from_utf8_lossy(bytes))))
}

impl FromResp for () {
	fn from_resp(_: RespValue) -> Result<Self> {
		Ok(())
	}
}

impl FromResp for RespValue {
	fn from_resp(value: RespValue) -> Result<Self> {
		Ok(value)
	}
}

impl FromResp for Bytes {
	fn from_resp(value: RespValue) -> Result<Self> {
		into_text(value, "bytes")
	}
}

impl FromResp for Vec<u8> {
	fn from_resp(value: RespValue) -> Result<Self> {
		into_text(value, "bytes").map(|b| b.to_vec())
	}
}

impl FromResp for String {
	fn from_resp(value: RespValue) -> Result<Self> {
		let bytes = into_text(value, "string")?;
		String::from_utf8(bytes.to_vec()).map_err(|_| Error::convert("string", "non-UTF-8 bytes"))
	}
}

macro_rules! impl_from_resp_int {
	($($ty:ty),*) => {
		$(
			impl FromResp for $ty {
				fn from_resp(value: RespValue) -> Result<Self> {
					match value {
						RespValue::Integer(i) => <$ty>::try_from(i)
							.map_err(|_| Error::convert(stringify!($ty), i.to_string())),
						RespValue::SimpleString(b) | RespValue::BulkString(b) | RespValue::BigNumber(b) => {
							parse_text(&b, stringify!($ty))
						}
						other => Err(reject(stringify!($ty), other)),
					}
				}
			}
		)*
	};
}

impl_from_resp_int!(i64, u64, i32, u32, usize);

impl FromResp for f64 {
	fn from_resp(value: RespValue) -> Result<Self> {
		match value {
			RespValue::Double(d) => Ok(d),
			RespValue::Integer(i) => Ok(i as f64),
			RespValue::SimpleString(b) | RespValue::BulkString(b) => parse_text(&b, "f64"),
			other => Err(reject("f64", other)),
		}
	}
}

impl FromResp for bool {
	fn from_resp(value: RespValue) -> Result<Self> {
		match value {
			RespValue::Boolean(b) => Ok(b),
			RespValue::Integer(0) => Ok(false),
			RespValue::Integer(1) => Ok(true),
			RespValue::SimpleString(b) | RespValue::BulkString(b) => match &b[..] {
				b"0" => Ok(false),
				b"1" => Ok(true),
				_ => Err(Error::convert("bool", String::from_utf8_lossy(&b))),
			},
			other => Err(reject("bool", other)),
		}
	}
}

impl<T: FromResp> FromResp for Option<T> {
	fn from_resp(value: RespValue) -> Result<Self> {
		match value {
			RespValue::Null => Ok(None),
			other => T::from_resp(other).map(Some),
		}
	}
}

impl<T: FromResp> FromResp for Vec<T> {
	fn from_resp(value: RespValue) -> Result<Self> {
		match value {
			RespValue::Array(items) | RespValue::Push(items) => {
				items.into_iter().map(T::from_resp).collect()
			}
			RespValue::Set(items) => items.into_iter().map(T::from_resp).collect(),
			other => Err(reject("array", other)),
		}
	}
}

impl<K, V> FromResp for HashMap<K, V>
where
	K: FromResp + Eq + Hash,
	V: FromResp,
{
	fn from_resp(value: RespValue) -> Result<Self> {
		match value {
			RespValue::Map(map) => map
				.into_iter()
				.map(|(k, v)| Ok((K::from_resp(k)?, V::from_resp(v)?)))
				.collect(),
			RespValue::Array(items) => {
				if items.len() % 2 != 0 {
					return Err(Error::convert(
						"map",
						format!("array of odd length {}", items.len()),
					));
				}
				let mut map = HashMap::with_capacity(items.len() / 2);
				let mut iter = items.into_iter();
				while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
					map.insert(K::from_resp(k)?, V::from_resp(v)?);
				}
				Ok(map)
			}
			other => Err(reject("map", other)),
		}
	}
}

impl<A: FromResp, B: FromResp> FromResp for (A, B) {
	fn from_resp(value: RespValue) -> Result<Self> {
		match value {
			RespValue::Array(items) if items.len() == 2 => {
				let mut iter = items.into_iter();
				match (iter.next(), iter.next()) {
					(Some(a), Some(b)) => Ok((A::from_resp(a)?, B::from_resp(b)?)),
					_ => Err(Error::convert("pair", "short array")),
				}
			}
			RespValue::Array(items) => Err(Error::convert(
				"pair",
				format!("array of length {}", items.len()),
			)),
			other => Err(reject("pair", other)),
		}
	}
}
