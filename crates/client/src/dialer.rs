//! Opening connections: address and URI resolution, transport setup and the
//! AUTH/SELECT handshake.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::net::TcpStream;
use url::Host;
use url::Url;

use crate::Cmd;
use crate::Conn;
use crate::Error;
use crate::Result;
use crate::config::DialConfig;
use crate::config::TlsConfig;
use crate::hook::DecodeHook;
use crate::stream::AnyStream;
use crate::tls;

pub const DEFAULT_PORT: u16 = 6379;

/// Dial with default options.
///
/// `addr` is `host:port`, `host`, a socket path for the `unix` network, or a
/// `redis://` / `rediss://` URI.
pub async fn dial(network: &str, addr: &str) -> Result<Conn> {
	Dialer::new().dial(network, addr).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
	Tcp,
	Tcp4,
	Tcp6,
	Unix,
}

impl Network {
	pub fn parse(network: &str) -> Result<Self> {
		match network.to_ascii_lowercase().as_str() {
			"tcp" => Ok(Network::Tcp),
			"tcp4" => Ok(Network::Tcp4),
			"tcp6" => Ok(Network::Tcp6),
			"unix" => Ok(Network::Unix),
			other => Err(Error::InvalidAddress(format!(
				"unsupported network {:?}",
				other
			))),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
	Tcp { host: String, port: u16 },
	Unix(PathBuf),
}

/// Everything a dial will use, after URI parsing and option merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
	pub network: Network,
	pub endpoint: Endpoint,
	pub auth_user: Option<String>,
	pub auth_pass: Option<String>,
	pub select_db: Option<u32>,
	pub tls: Option<TlsConfig>,
}

/// Fields a connection URI may carry.
#[derive(Debug, Default, PartialEq, Eq)]
struct UriParts {
	auth_user: Option<String>,
	auth_pass: Option<String>,
	select_db: Option<u32>,
	tls: bool,
}

/// Builder for connections.
///
/// ```no_run
/// # async fn demo() -> client::Result<()> {
/// let conn = client::Dialer::new()
/// 	.auth_pass("secret")
/// 	.select_db(2)
/// 	.dial("tcp", "redis://127.0.0.1:6379")
/// 	.await?;
/// let pong: String = conn.do_cmd(&client::Cmd::new("PING")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Dialer {
	config: DialConfig,
	hook: Option<Arc<dyn DecodeHook>>,
}

impl Dialer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_config(config: DialConfig) -> Self {
		Self { config, hook: None }
	}

	pub fn auth_user(mut self, user: impl Into<String>) -> Self {
		self.config.auth_user = Some(user.into());
		self
	}

	pub fn auth_pass(mut self, pass: impl Into<String>) -> Self {
		self.config.auth_pass = Some(pass.into());
		self
	}

	pub fn select_db(mut self, db: u32) -> Self {
		self.config.select_db = Some(db);
		self
	}

	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.config.timeout = Some(timeout);
		self
	}

	pub fn tls(mut self, tls: TlsConfig) -> Self {
		self.config.tls = Some(tls);
		self
	}

	/// Install a hook awaited before every reply is decoded on connections
	/// from this dialer, the handshake included.
	pub fn decode_hook(mut self, hook: Arc<dyn DecodeHook>) -> Self {
		self.hook = Some(hook);
		self
	}

	pub fn config(&self) -> &DialConfig {
		&self.config
	}

	/// Parse `addr` and merge it with this dialer's options without
	/// connecting.
	pub fn resolve(&self, network: &str, addr: &str) -> Result<Target> {
		let network = Network::parse(network)?;

		let (endpoint, uri) = if network == Network::Unix {
			if addr.is_empty() || addr.contains("://") {
				return Err(Error::InvalidAddress(format!(
					"expected a socket path, got {:?}",
					addr
				)));
			}
			(Endpoint::Unix(PathBuf::from(addr)), UriParts::default())
		} else if addr.contains("://") {
			parse_uri(addr)?
		} else {
			(parse_host_port(addr)?, UriParts::default())
		};

		let tls = match (&self.config.tls, uri.tls) {
			(Some(tls), _) => Some(tls.clone()),
			(None, true) => Some(TlsConfig::default()),
			(None, false) => None,
		};
		if tls.is_some() && network == Network::Unix {
			return Err(Error::InvalidAddress(
				"TLS is not supported over unix sockets".to_string(),
			));
		}

		Ok(Target {
			network,
			endpoint,
			auth_user: self.config.auth_user.clone().or(uri.auth_user),
			auth_pass: self.config.auth_pass.clone().or(uri.auth_pass),
			select_db: self.config.select_db.or(uri.select_db),
			tls,
		})
	}

	/// Connect, authenticate and select the database.
	///
	/// On any failure the half-open connection is closed and the error is
	/// returned. Server errors from AUTH or SELECT come back verbatim as
	/// [`Error::Server`].
	pub async fn dial(&self, network: &str, addr: &str) -> Result<Conn> {
		let target = self.resolve(network, addr)?;
		match self.config.timeout {
			Some(limit) => tokio::time::timeout(limit, self.dial_target(&target))
				.await
				.map_err(|_| Error::Timeout(limit))?,
			None => self.dial_target(&target).await,
		}
	}

	async fn dial_target(&self, target: &Target) -> Result<Conn> {
		let (stream, peer) = connect(target).await?;
		debug!("Connected to {}", peer);

		let conn = Conn::with_hook(stream, peer, self.hook.clone());
		let mut guard = CloseOnDrop {
			conn: &conn,
			armed: true,
		};
		handshake(&conn, target).await?;
		guard.armed = false;
		drop(guard);

		Ok(conn)
	}
}

impl std::fmt::Debug for Dialer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Dialer")
			.field("auth_user", &self.config.auth_user)
			.field("select_db", &self.config.select_db)
			.field("timeout", &self.config.timeout)
			.field("tls", &self.config.tls)
			.field("decode_hook", &self.hook.is_some())
			.finish_non_exhaustive()
	}
}

/// Closes a connection whose handshake did not finish, whether it failed
/// or the dial future was dropped.
struct CloseOnDrop<'a> {
	conn: &'a Conn,
	armed: bool,
}

impl Drop for CloseOnDrop<'_> {
	fn drop(&mut self) {
		if self.armed {
			debug!("Abandoning half-open connection to {}", self.conn.peer());
			let _ = self.conn.close();
		}
	}
}

async fn handshake(conn: &Conn, target: &Target) -> Result<()> {
	let user = target.auth_user.as_deref().unwrap_or_default();
	let pass = target.auth_pass.as_deref().unwrap_or_default();

	if !user.is_empty() {
		conn.run(&Cmd::new("AUTH").arg(user).arg(pass)).await?;
	} else if !pass.is_empty() {
		conn.run(&Cmd::new("AUTH").arg(pass)).await?;
	}

	if let Some(db) = target.select_db {
		conn.run(&Cmd::new("SELECT").arg(db)).await?;
	}
	Ok(())
}

async fn connect(target: &Target) -> Result<(AnyStream, String)> {
	match &target.endpoint {
		Endpoint::Tcp { host, port } => {
			let tcp = connect_tcp(target.network, host, *port).await?;
			let peer = tcp
				.peer_addr()
				.map(|a| a.to_string())
				.unwrap_or_else(|_| format!("{}:{}", host, port));
			tcp.set_nodelay(true)?;
			let stream = match &target.tls {
				Some(config) => tls::connect(tcp, host, config).await?,
				None => AnyStream::from(tcp),
			};
			Ok((stream, peer))
		}
		#[cfg(unix)]
		Endpoint::Unix(path) => {
			let stream = tokio::net::UnixStream::connect(path).await?;
			Ok((AnyStream::from(stream), path.display().to_string()))
		}
		#[cfg(not(unix))]
		Endpoint::Unix(path) => Err(Error::InvalidAddress(format!(
			"unix sockets are not supported on this platform: {}",
			path.display()
		))),
	}
}

async fn connect_tcp(network: Network, host: &str, port: u16) -> Result<TcpStream> {
	let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
		.await?
		.filter(|addr| match network {
			Network::Tcp4 => addr.is_ipv4(),
			Network::Tcp6 => addr.is_ipv6(),
			_ => true,
		})
		.collect();

	let mut last_err = None;
	for addr in addrs {
		match TcpStream::connect(addr).await {
			Ok(stream) => return Ok(stream),
			Err(e) => {
				debug!("Connect to {} failed: {}", addr, e);
				last_err = Some(e);
			}
		}
	}
	match last_err {
		Some(e) => Err(e.into()),
		None => Err(Error::InvalidAddress(format!(
			"no {:?} address found for {}",
			network, host
		))),
	}
}

fn parse_host_port(addr: &str) -> Result<Endpoint> {
	let invalid = || Error::InvalidAddress(addr.to_string());

	let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
		let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
		match tail {
			"" => (host, None),
			_ => (host, Some(tail.strip_prefix(':').ok_or_else(invalid)?)),
		}
	} else {
		match addr.rsplit_once(':') {
			// A bare IPv6 literal without brackets has no port.
			Some((host, _)) if host.contains(':') => (addr, None),
			Some((host, port)) => (host, Some(port)),
			None => (addr, None),
		}
	};

	if host.is_empty() {
		return Err(invalid());
	}
	let port = match port {
		Some(p) => p.parse().map_err(|_| invalid())?,
		None => DEFAULT_PORT,
	};
	Ok(Endpoint::Tcp {
		host: host.to_string(),
		port,
	})
}

fn parse_uri(addr: &str) -> Result<(Endpoint, UriParts)> {
	let url = Url::parse(addr).map_err(|e| Error::InvalidAddress(format!("{}: {}", addr, e)))?;

	let tls = match url.scheme() {
		"redis" => false,
		"rediss" => true,
		other => {
			return Err(Error::InvalidAddress(format!(
				"unsupported scheme {:?}",
				other
			)));
		}
	};

	let host = match url.host() {
		Some(Host::Domain(d)) if !d.is_empty() => d.to_string(),
		Some(Host::Ipv4(ip)) => ip.to_string(),
		Some(Host::Ipv6(ip)) => ip.to_string(),
		_ => return Err(Error::InvalidAddress(format!("missing host in {}", addr))),
	};
	let endpoint = Endpoint::Tcp {
		host,
		port: url.port().unwrap_or(DEFAULT_PORT),
	};

	let mut parts = UriParts {
		tls,
		auth_user: non_empty(decode(url.username())?),
		auth_pass: url.password().map(decode).transpose()?.and_then(non_empty),
		select_db: match url.path().trim_matches('/') {
			"" => None,
			db => Some(parse_db(db)?),
		},
	};

	// Query parameters take precedence over userinfo and path.
	for (key, value) in url.query_pairs() {
		match key.as_ref() {
			"username" => parts.auth_user = non_empty(value.into_owned()),
			"password" => parts.auth_pass = non_empty(value.into_owned()),
			"db" => parts.select_db = Some(parse_db(&value)?),
			other => debug!("Ignoring unknown URI parameter {:?}", other),
		}
	}

	Ok((endpoint, parts))
}

fn decode(raw: &str) -> Result<String> {
	urlencoding::decode(raw)
		.map(|s| s.into_owned())
		.map_err(|e| Error::InvalidAddress(format!("bad percent-encoding in {:?}: {}", raw, e)))
}

fn non_empty(s: String) -> Option<String> {
	if s.is_empty() { None } else { Some(s) }
}

fn parse_db(db: &str) -> Result<u32> {
	db.parse()
		.map_err(|_| Error::InvalidAddress(format!("invalid database index {:?}", db)))
}
