//! Human-readable reply rendering in the style of `redis-cli`.

use std::fmt::Write;

use client::RespValue;

pub fn render(value: &RespValue) -> String {
	let mut out = String::new();
	write_value(&mut out, value, 0);
	out
}

fn write_value(out: &mut String, value: &RespValue, indent: usize) {
	match value {
		RespValue::SimpleString(s) => out.push_str(&String::from_utf8_lossy(s)),
		RespValue::Error(e) | RespValue::BulkError(e) => {
			let _ = write!(out, "(error) {}", String::from_utf8_lossy(e));
		}
		RespValue::Integer(i) => {
			let _ = write!(out, "(integer) {}", i);
		}
		RespValue::BulkString(b) => quote(out, b),
		RespValue::VerbatimString { data, .. } => out.push_str(&String::from_utf8_lossy(data)),
		RespValue::Null => out.push_str("(nil)"),
		RespValue::Boolean(b) => {
			let _ = write!(out, "({})", b);
		}
		RespValue::Double(d) => {
			let _ = write!(out, "(double) {}", d);
		}
		RespValue::BigNumber(n) => {
			let _ = write!(out, "(big number) {}", String::from_utf8_lossy(n));
		}
		RespValue::Array(items) | RespValue::Push(items) => {
			write_seq(out, items.iter(), items.len(), ')', "(empty array)", indent)
		}
		RespValue::Set(items) => write_seq(out, items.iter(), items.len(), '~', "(empty set)", indent),
		RespValue::Map(map) => {
			if map.is_empty() {
				out.push_str("(empty hash)");
				return;
			}
			let width = map.len().to_string().len();
			for (i, (key, value)) in map.iter().enumerate() {
				let label = format!("{:>width$}# ", i + 1, width = width);
				start_line(out, i, indent);
				out.push_str(&label);
				write_value(out, key, indent + label.len());
				out.push_str(" => ");
				write_value(out, value, indent + label.len());
			}
		}
	}
}

fn write_seq<'a>(
	out: &mut String,
	items: impl Iterator<Item = &'a RespValue>,
	len: usize,
	marker: char,
	empty: &str,
	indent: usize,
) {
	if len == 0 {
		out.push_str(empty);
		return;
	}
	let width = len.to_string().len();
	for (i, item) in items.enumerate() {
		let label = format!("{:>width$}{} ", i + 1, marker, width = width);
		start_line(out, i, indent);
		out.push_str(&label);
		write_value(out, item, indent + label.len());
	}
}

fn start_line(out: &mut String, i: usize, indent: usize) {
	if i > 0 {
		out.push('\n');
		out.extend(std::iter::repeat_n(' ', indent));
	}
}

fn quote(out: &mut String, bytes: &[u8]) {
	out.push('"');
	for &b in bytes {
		match b {
			b'\\' => out.push_str("\\\\"),
			b'"' => out.push_str("\\\""),
			b'\n' => out.push_str("\\n"),
			b'\r' => out.push_str("\\r"),
			b'\t' => out.push_str("\\t"),
			0x07 => out.push_str("\\a"),
			0x08 => out.push_str("\\b"),
			0x20..=0x7e => out.push(b as char),
			_ => {
				let _ = write!(out, "\\x{:02x}", b);
			}
		}
	}
	out.push('"');
}
