use std::fmt;

use bytes::Bytes;
use bytes::BytesMut;

/// A command: the verb followed by its operands, each binary-safe.
///
/// ```
/// use client::Cmd;
///
/// let cmd = Cmd::new("SET").arg("key").arg(42);
/// assert_eq!(cmd.name(), "SET");
/// assert_eq!(cmd.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
	args: Vec<Bytes>,
}

/// Shorthand for `Cmd::new(name).args(args)`.
pub fn cmd<I, A>(name: &str, args: I) -> Cmd
where
	I: IntoIterator<Item = A>,
	A: IntoArg,
{
	Cmd::new(name).args(args)
}

impl Cmd {
	pub fn new(name: impl IntoArg) -> Self {
		Self {
			args: vec![name.into_arg()],
		}
	}

	pub fn arg(mut self, arg: impl IntoArg) -> Self {
		self.args.push(arg.into_arg());
		self
	}

	pub fn args<I, A>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = A>,
		A: IntoArg,
	{
		self.args.extend(args.into_iter().map(IntoArg::into_arg));
		self
	}

	/// The verb, upper-cased.
	pub fn name(&self) -> String {
		String::from_utf8_lossy(&self.args[0]).to_uppercase()
	}

	pub fn as_args(&self) -> &[Bytes] {
		&self.args
	}

	pub fn len(&self) -> usize {
		self.args.len()
	}

	pub fn is_empty(&self) -> bool {
		self.args.is_empty()
	}

	pub(crate) fn encode_to(&self, buf: &mut BytesMut) {
		resp::encode_command(&self.args, buf);
	}
}

/// Renders the command for logs. Operands of `AUTH` are masked.
impl fmt::Display for Cmd {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = self.name();
		write!(f, "{}", name)?;
		if name == "AUTH" {
			for _ in &self.args[1..] {
				write!(f, " ***")?;
			}
			return Ok(());
		}
		for arg in &self.args[1..] {
			write!(f, " {}", String::from_utf8_lossy(arg))?;
		}
		Ok(())
	}
}

/// Conversion of a command operand into its wire bytes.
pub trait IntoArg {
	fn into_arg(self) -> Bytes;
}

impl IntoArg for Bytes {
	fn into_arg(self) -> Bytes {
		self
	}
}

impl IntoArg for &Bytes {
	fn into_arg(self) -> Bytes {
		self.clone()
	}
}

impl IntoArg for Vec<u8> {
	fn into_arg(self) -> Bytes {
		Bytes::from(self)
	}
}

impl IntoArg for &[u8] {
	fn into_arg(self) -> Bytes {
		Bytes::copy_from_slice(self)
	}
}

impl IntoArg for String {
	fn into_arg(self) -> Bytes {
		Bytes::from(self)
	}
}

impl IntoArg for &String {
	fn into_arg(self) -> Bytes {
		Bytes::copy_from_slice(self.as_bytes())
	}
}

impl IntoArg for &str {
	fn into_arg(self) -> Bytes {
		Bytes::copy_from_slice(self.as_bytes())
	}
}

macro_rules! impl_into_arg_display {
	($($ty:ty),*) => {
		$(
			impl IntoArg for $ty {
				fn into_arg(self) -> Bytes {
					Bytes::from(self.to_string())
				}
			}
		)*
	};
}

impl_into_arg_display!(i32, i64, u32, u64, usize, f64);
