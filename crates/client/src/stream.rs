use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::io::ReadBuf;
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio_rustls::client::TlsStream;

/// The transports a connection can run over.
pub enum AnyStream {
	Tcp(TcpStream),
	Tls(Box<TlsStream<TcpStream>>),
	#[cfg(unix)]
	Unix(UnixStream),
}

impl From<TcpStream> for AnyStream {
	fn from(stream: TcpStream) -> Self {
		AnyStream::Tcp(stream)
	}
}

impl From<TlsStream<TcpStream>> for AnyStream {
	fn from(stream: TlsStream<TcpStream>) -> Self {
		AnyStream::Tls(Box::new(stream))
	}
}

#[cfg(unix)]
impl From<UnixStream> for AnyStream {
	fn from(stream: UnixStream) -> Self {
		AnyStream::Unix(stream)
	}
}

impl AsyncRead for AnyStream {
	fn poll_read(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<std::io::Result<()>> {
		match self.get_mut() {
			AnyStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
			AnyStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
			#[cfg(unix)]
			AnyStream::Unix(s) => Pin::new(s).poll_read(cx, buf),
		}
	}
}

impl AsyncWrite for AnyStream {
	fn poll_write(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &[u8],
	) -> Poll<Result<usize, std::io::Error>> {
		match self.get_mut() {
			AnyStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
			AnyStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
			#[cfg(unix)]
			AnyStream::Unix(s) => Pin::new(s).poll_write(cx, buf),
		}
	}

	fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), std::io::Error>> {
		match self.get_mut() {
			AnyStream::Tcp(s) => Pin::new(s).poll_flush(cx),
			AnyStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
			#[cfg(unix)]
			AnyStream::Unix(s) => Pin::new(s).poll_flush(cx),
		}
	}

	fn poll_shutdown(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
	) -> Poll<Result<(), std::io::Error>> {
		match self.get_mut() {
			AnyStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
			AnyStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
			#[cfg(unix)]
			AnyStream::Unix(s) => Pin::new(s).poll_shutdown(cx),
		}
	}
}
