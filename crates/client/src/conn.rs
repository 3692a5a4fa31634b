//! A single RESP connection.
//!
//! RESP carries no request ids, so replies are matched to requests purely by
//! order. Writes are serialized by one lock and reads by another. A round
//! trip takes the read lock before it lets go of the write lock, so readers
//! line up in the order their requests went out.
//!
//! All socket I/O runs in a spawned task that owns the locks it needs.
//! Dropping the future returned by [`Conn::do_cmd`] abandons the wait but
//! never the read: the task drains the reply and the next caller starts on
//! a synchronized stream. A caller that leaves while its request is only
//! partly written kills the connection instead, since the frame can no
//! longer be completed.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use bytes::Buf;
use bytes::BytesMut;
use log::debug;
use log::warn;
use resp::RespParseResult;
use resp::RespParser;
use resp::RespValue;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::ReadHalf;
use tokio::io::WriteHalf;
use tokio::sync::Mutex;
use tokio::sync::OwnedMutexGuard;
use tokio::sync::oneshot;
use tokio::sync::watch;

use crate::Cmd;
use crate::Error;
use crate::FromResp;
use crate::Result;
use crate::hook::DecodeHook;
use crate::stream::AnyStream;

const READ_BUF_CAPACITY: usize = 4096;

/// Handle to one connection. Clones share the same socket.
#[derive(Clone)]
pub struct Conn {
	inner: Arc<Inner>,
}

struct Inner {
	writer: Arc<Mutex<Writer>>,
	reader: Arc<Mutex<Reader>>,
	dead: AtomicBool,
	/// First fatal error, returned to every caller once `dead` is set.
	err: OnceLock<Error>,
	closed: watch::Sender<bool>,
	hook: Option<Arc<dyn DecodeHook>>,
	peer: String,
}

struct Writer {
	stream: Option<WriteHalf<AnyStream>>,
	buf: BytesMut,
}

struct Reader {
	stream: Option<ReadHalf<AnyStream>>,
	buf: BytesMut,
	parser: RespParser,
}

/// One half of the socket. Dropped once the connection is dead.
trait Half: Send + 'static {
	fn shut(&mut self);
}

type ReplyTx = oneshot::Sender<Result<Option<RespValue>>>;

/// Work handed to a spawned I/O task, with the locks it needs.
enum Exchange {
	RoundTrip(OwnedMutexGuard<Writer>, Cmd),
	Send(OwnedMutexGuard<Writer>, Cmd),
	Recv(OwnedMutexGuard<Reader>),
}

enum Written {
	Full,
	/// The caller left before a single byte went out.
	Nothing,
}

impl Conn {
	/// Wrap an already connected stream. No handshake is performed.
	pub fn new(stream: impl Into<AnyStream>, peer: impl Into<String>) -> Self {
		Self::with_hook(stream.into(), peer.into(), None)
	}

	pub(crate) fn with_hook(
		stream: AnyStream,
		peer: String,
		hook: Option<Arc<dyn DecodeHook>>,
	) -> Self {
		let (closed, _) = watch::channel(false);
		let (read, write) = tokio::io::split(stream);
		let writer = Writer {
			stream: Some(write),
			buf: BytesMut::new(),
		};
		let reader = Reader {
			stream: Some(read),
			buf: BytesMut::with_capacity(READ_BUF_CAPACITY),
			parser: RespParser::new(),
		};
		Self {
			inner: Arc::new(Inner {
				writer: Arc::new(Mutex::new(writer)),
				reader: Arc::new(Mutex::new(reader)),
				dead: AtomicBool::new(false),
				err: OnceLock::new(),
				closed,
				hook,
				peer,
			}),
		}
	}

	/// Send `cmd` and decode its reply into `T`.
	///
	/// An error reply from the server is returned as [`Error::Server`] and
	/// leaves the connection usable. I/O and protocol errors kill it.
	///
	/// Cancel-safe: if the returned future is dropped after the request was
	/// written, the reply is still read and discarded in the background. If
	/// it is dropped while the request is partly written, the connection is
	/// killed with an [`Error::Io`] of kind `TimedOut`.
	pub async fn do_cmd<T: FromResp>(&self, cmd: &Cmd) -> Result<T> {
		let writer = self.lock(&self.inner.writer).await?;
		let value = self.exchange(Exchange::RoundTrip(writer, cmd.clone())).await?;
		decode(value)
	}

	/// Send `cmd` and check that it succeeded, discarding the reply.
	pub async fn run(&self, cmd: &Cmd) -> Result<()> {
		self.do_cmd(cmd).await
	}

	/// Write `cmd` without waiting for its reply.
	///
	/// The reply stays queued on the connection until a [`Conn::recv`]
	/// claims it. Each `send` has to be matched by one `recv`, otherwise a
	/// later round trip reads a reply meant for someone else.
	pub async fn send(&self, cmd: &Cmd) -> Result<()> {
		let writer = self.lock(&self.inner.writer).await?;
		self.exchange(Exchange::Send(writer, cmd.clone())).await?;
		Ok(())
	}

	/// Read the oldest unclaimed reply and decode it into `T`.
	///
	/// A `recv` dropped after it started reading still consumes its reply.
	pub async fn recv<T: FromResp>(&self) -> Result<T> {
		let reader = self.lock(&self.inner.reader).await?;
		let value = self.exchange(Exchange::Recv(reader)).await?;
		decode(value)
	}

	/// Close the connection.
	///
	/// Safe to call at any time and any number of times. A round trip in
	/// flight fails promptly with [`Error::Closed`]. Returns the latched
	/// error if the connection had already died of an I/O or protocol
	/// failure.
	pub fn close(&self) -> Result<()> {
		let earlier = self.inner.err.get().cloned();
		if self.inner.kill(Error::Closed) {
			debug!("Closing connection to {}", self.inner.peer);
		}
		self.inner.closed.send_replace(true);
		self.inner.shutdown();
		match earlier {
			None | Some(Error::Closed) => Ok(()),
			Some(e) => Err(e),
		}
	}

	pub fn is_closed(&self) -> bool {
		self.inner.is_dead()
	}

	/// The error that killed the connection, if it is dead.
	pub fn err(&self) -> Option<Error> {
		if self.inner.is_dead() {
			Some(self.inner.latched())
		} else {
			None
		}
	}

	pub fn peer(&self) -> &str {
		&self.inner.peer
	}

	async fn lock<T>(&self, half: &Arc<Mutex<T>>) -> Result<OwnedMutexGuard<T>> {
		self.inner.check_alive()?;
		let guard = half.clone().lock_owned().await;
		// Closed while queued for the lock.
		self.inner.check_alive()?;
		Ok(guard)
	}

	async fn exchange(&self, exchange: Exchange) -> Result<Option<RespValue>> {
		let (tx, rx) = oneshot::channel();
		tokio::spawn(run_exchange(self.inner.clone(), exchange, tx));

		match rx.await {
			Ok(result) => result,
			Err(_) => Err(self.inner.latched()),
		}
	}
}

impl fmt::Debug for Conn {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Conn")
			.field("peer", &self.inner.peer)
			.field("closed", &self.is_closed())
			.finish()
	}
}

fn decode<T: FromResp>(value: Option<RespValue>) -> Result<T> {
	let value = value.ok_or(Error::Closed)?;
	if let Some(msg) = value.error_message() {
		return Err(Error::Server(msg));
	}
	T::from_resp(value)
}

/// Body of the task spawned for each exchange.
///
/// Owns the lock guards and the result sender, so it runs to completion
/// even if the caller stops waiting.
async fn run_exchange(inner: Arc<Inner>, exchange: Exchange, mut tx: ReplyTx) {
	let mut closed = inner.closed.subscribe();

	let (what, result) = match exchange {
		Exchange::Send(mut writer, cmd) => {
			let what = cmd.name();
			let result = write_request(&inner, &mut writer, &cmd, &mut tx, &mut closed).await;
			inner.release(writer);
			(what, result.map(|_| None))
		}
		Exchange::RoundTrip(mut writer, cmd) => {
			let what = cmd.name();
			let result = match write_request(&inner, &mut writer, &cmd, &mut tx, &mut closed).await
			{
				Ok(Written::Full) => {
					let reader = lock_reader(&inner, &mut closed).await;
					inner.release(writer);
					match reader {
						Ok(mut reader) => {
							let result = read_reply(&inner, &mut reader, &mut closed, &what).await;
							inner.release(reader);
							result.map(Some)
						}
						Err(e) => Err(e),
					}
				}
				Ok(Written::Nothing) => {
					inner.release(writer);
					Ok(None)
				}
				Err(e) => {
					inner.release(writer);
					Err(e)
				}
			};
			(what, result)
		}
		Exchange::Recv(mut reader) => {
			let what = "RECV".to_string();
			let result = read_reply(&inner, &mut reader, &mut closed, &what).await;
			inner.release(reader);
			(what, result.map(Some))
		}
	};

	if tx.send(result).is_err() {
		debug!("Discarded result of abandoned {} on {}", what, inner.peer);
	}
}

/// Write `cmd` unless the caller leaves first.
async fn write_request(
	inner: &Inner,
	writer: &mut Writer,
	cmd: &Cmd,
	tx: &mut ReplyTx,
	closed: &mut watch::Receiver<bool>,
) -> Result<Written> {
	let result = writer.write_request(cmd, tx, closed).await;
	if let Err(e) = &result {
		inner.fail(e, &cmd.name());
	}
	result
}

/// Queue for the read side right after a request went out.
async fn lock_reader(
	inner: &Inner,
	closed: &mut watch::Receiver<bool>,
) -> Result<OwnedMutexGuard<Reader>> {
	tokio::select! {
		biased;
		_ = closed.wait_for(|closed| *closed) => Err(Error::Closed),
		reader = inner.reader.clone().lock_owned() => Ok(reader),
	}
}

async fn read_reply(
	inner: &Inner,
	reader: &mut Reader,
	closed: &mut watch::Receiver<bool>,
	what: &str,
) -> Result<RespValue> {
	inner.check_alive()?;
	let result = tokio::select! {
		biased;
		_ = closed.wait_for(|closed| *closed) => Err(Error::Closed),
		res = reader.read_reply(inner.hook.as_deref()) => res,
	};
	if let Err(e) = &result {
		inner.fail(e, what);
	}
	result
}

impl Inner {
	/// Mark the connection dead, latching `err` unless an earlier error is
	/// already latched. Returns true for the call that killed it.
	fn kill(&self, err: Error) -> bool {
		let _ = self.err.set(err);
		!self.dead.swap(true, Ordering::AcqRel)
	}

	/// Kill the connection if `err` is fatal.
	fn fail(&self, err: &Error, what: &str) {
		if err.is_fatal() && self.kill(err.clone()) {
			warn!("Connection to {} died during {}: {}", self.peer, what, err);
			self.shutdown();
		}
	}

	/// Drop both socket halves, now if idle or once their holder lets go.
	fn shutdown(&self) {
		shut_when_free(&self.writer);
		shut_when_free(&self.reader);
	}

	/// Give a half back, dropping its socket first if the connection died.
	fn release<T: Half>(&self, mut guard: OwnedMutexGuard<T>) {
		if self.is_dead() {
			guard.shut();
		}
	}

	fn is_dead(&self) -> bool {
		self.dead.load(Ordering::Acquire)
	}

	fn latched(&self) -> Error {
		self.err.get().cloned().unwrap_or(Error::Closed)
	}

	fn check_alive(&self) -> Result<()> {
		if self.is_dead() {
			Err(self.latched())
		} else {
			Ok(())
		}
	}
}

fn shut_when_free<T: Half>(half: &Arc<Mutex<T>>) {
	match half.clone().try_lock_owned() {
		Ok(mut guard) => guard.shut(),
		Err(_) => {
			if let Ok(runtime) = tokio::runtime::Handle::try_current() {
				let half = half.clone();
				runtime.spawn(async move { half.lock().await.shut() });
			}
		}
	}
}

impl Writer {
	async fn write_request(
		&mut self,
		cmd: &Cmd,
		tx: &mut ReplyTx,
		closed: &mut watch::Receiver<bool>,
	) -> Result<Written> {
		let stream = self.stream.as_mut().ok_or(Error::Closed)?;

		self.buf.clear();
		cmd.encode_to(&mut self.buf);
		let total = self.buf.len();

		let abandoned = tokio::select! {
			biased;
			_ = closed.wait_for(|closed| *closed) => return Err(Error::Closed),
			_ = tx.closed() => true,
			res = write_frame(stream, &mut self.buf) => {
				res?;
				false
			}
		};
		if !abandoned {
			return Ok(Written::Full);
		}

		let sent = total - self.buf.len();
		self.buf.clear();
		if sent == 0 {
			return Ok(Written::Nothing);
		}
		Err(io::Error::new(
			io::ErrorKind::TimedOut,
			format!(
				"caller left after {} of {} bytes of {} were written",
				sent,
				total,
				cmd.name()
			),
		)
		.into())
	}
}

impl Half for Writer {
	fn shut(&mut self) {
		self.stream = None;
		self.buf.clear();
	}
}

async fn write_frame<W: AsyncWrite + Unpin>(stream: &mut W, buf: &mut BytesMut) -> io::Result<()> {
	while buf.has_remaining() {
		if stream.write_buf(buf).await? == 0 {
			return Err(io::ErrorKind::WriteZero.into());
		}
	}
	stream.flush().await
}

impl Reader {
	async fn read_reply(&mut self, hook: Option<&dyn DecodeHook>) -> Result<RespValue> {
		let stream = self.stream.as_mut().ok_or(Error::Closed)?;

		if let Some(hook) = hook {
			hook.before_decode().await;
		}

		loop {
			match self.parser.parse(&mut self.buf) {
				RespParseResult::Complete(value) => return Ok(value),
				RespParseResult::Incomplete => {}
				RespParseResult::Error(e) => return Err(e.into()),
			}

			let n = stream.read_buf(&mut self.buf).await?;
			if n == 0 {
				return Err(io::Error::new(
					io::ErrorKind::UnexpectedEof,
					"connection closed by peer",
				)
				.into());
			}
		}
	}
}

impl Half for Reader {
	fn shut(&mut self) {
		self.stream = None;
		self.buf.clear();
		self.parser.reset();
	}
}
