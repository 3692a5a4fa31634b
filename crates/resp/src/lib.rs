//! # RESP - Redis Serialization Protocol Library
//!
//! The wire codec used by the client: a streaming reply parser and an
//! encoder for commands and values.
//!
//! Both RESP2 and RESP3 reply types are understood. Commands are always
//! written as arrays of bulk strings.
//!
//! ## Example
//!
//! ```rust
//! use bytes::BytesMut;
//!
//! let mut out = BytesMut::new();
//! resp::encode_command(&["ECHO", "hi"], &mut out);
//! assert_eq!(&out[..], b"*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n");
//!
//! let mut buf = BytesMut::from(&b"$2\r\nhi\r\n"[..]);
//! let reply = resp::parse(&mut buf).unwrap();
//! assert_eq!(reply.as_str(), Some("hi"));
//! ```

mod encode;
mod error;
mod parser;
mod types;
mod utils;

pub use encode::EncodeError;
pub use encode::RespEncoder;
pub use encode::encode_command;
pub use error::ParseError;
pub use parser::RespParseResult;
pub use parser::RespParser;
pub use parser::parse;
pub use types::RespValue;
pub use utils::MAX_BULK_LEN;
