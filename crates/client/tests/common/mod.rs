//! In-process RESP server implementing the handful of commands the
//! connection tests rely on.

#![allow(dead_code)]

use std::collections::HashMap;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use bytes::Bytes;
use bytes::BytesMut;
use resp::RespEncoder;
use resp::RespParseResult;
use resp::RespParser;
use resp::RespValue;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::sync::oneshot;

pub const NO_PASSWORD_ERR: &str = "ERR AUTH <password> called without any password configured for the default user. Are you sure your configuration is correct?";
pub const WRONGPASS_ERR: &str = "WRONGPASS invalid username-password pair or user is disabled.";

const DATABASES: u32 = 16;

pub fn random_name() -> String {
	ulid::Ulid::new().to_string().to_lowercase()
}

/// How a blocked client was released by `CLIENT UNBLOCK`.
#[derive(Debug, Clone, Copy)]
enum Unblock {
	Timeout,
	Error,
}

struct ClientInfo {
	addr: String,
	name: String,
	db: u32,
	blocked: Option<oneshot::Sender<Unblock>>,
}

#[derive(Default)]
struct State {
	users: HashMap<String, String>,
	next_id: AtomicI64,
	commands: AtomicUsize,
	clients: Mutex<HashMap<i64, ClientInfo>>,
	strings: Mutex<HashMap<(u32, Bytes), Bytes>>,
	lists: Mutex<HashMap<(u32, Bytes), VecDeque<Bytes>>>,
	pushed: Notify,
}

pub struct FakeServer {
	addr: SocketAddr,
	state: Arc<State>,
}

impl FakeServer {
	pub async fn start() -> Self {
		Self::start_with_users(&[]).await
	}

	/// Start a server with ACL users in addition to the password-less
	/// default user.
	pub async fn start_with_users(users: &[(&str, &str)]) -> Self {
		let state = Arc::new(State {
			users: users
				.iter()
				.map(|(u, p)| (u.to_string(), p.to_string()))
				.collect(),
			..Default::default()
		});
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();

		let accept_state = state.clone();
		tokio::spawn(async move {
			while let Ok((socket, peer)) = listener.accept().await {
				let state = accept_state.clone();
				tokio::spawn(serve(socket, peer.to_string(), state));
			}
		});

		Self { addr, state }
	}

	/// Serve the same state on a unix socket as well.
	#[cfg(unix)]
	pub fn listen_unix(&self, path: &std::path::Path) {
		let listener = tokio::net::UnixListener::bind(path).unwrap();
		let state = self.state.clone();
		tokio::spawn(async move {
			while let Ok((socket, _)) = listener.accept().await {
				tokio::spawn(serve(socket, "unix".to_string(), state.clone()));
			}
		});
	}

	/// Serve the same state over TLS on a new port and return its address.
	pub async fn listen_tls(&self, acceptor: tokio_rustls::TlsAcceptor) -> String {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap().to_string();
		let state = self.state.clone();
		tokio::spawn(async move {
			while let Ok((socket, peer)) = listener.accept().await {
				let acceptor = acceptor.clone();
				let state = state.clone();
				tokio::spawn(async move {
					// Clients that reject the certificate just go away.
					if let Ok(tls) = acceptor.accept(socket).await {
						serve(tls, peer.to_string(), state).await;
					}
				});
			}
		});
		addr
	}

	pub fn addr(&self) -> String {
		self.addr.to_string()
	}

	pub fn url(&self) -> String {
		format!("redis://{}", self.addr)
	}

	/// Total number of commands received over all connections.
	pub fn commands_seen(&self) -> usize {
		self.state.commands.load(Ordering::SeqCst)
	}

	pub fn connected_clients(&self) -> usize {
		self.state.clients.lock().unwrap().len()
	}

	/// Wait until the number of connected clients drops to `n`.
	pub async fn wait_for_clients(&self, n: usize) {
		tokio::time::timeout(Duration::from_secs(5), async {
			while self.connected_clients() != n {
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		})
		.await
		.unwrap_or_else(|_| panic!("expected {} clients, have {}", n, self.connected_clients()));
	}
}

async fn serve<S>(mut socket: S, addr: String, state: Arc<State>)
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	let id = state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
	state.clients.lock().unwrap().insert(
		id,
		ClientInfo {
			addr,
			name: String::new(),
			db: 0,
			blocked: None,
		},
	);

	let mut parser = RespParser::new();
	let mut buffer = BytesMut::with_capacity(4096);
	'conn: loop {
		match socket.read_buf(&mut buffer).await {
			Ok(0) | Err(_) => break,
			Ok(_) => {}
		}

		loop {
			let value = match parser.parse(&mut buffer) {
				RespParseResult::Complete(value) => value,
				RespParseResult::Incomplete => break,
				RespParseResult::Error(_) => break 'conn,
			};
			state.commands.fetch_add(1, Ordering::SeqCst);

			let args: Vec<Bytes> = value
				.into_vec()
				.unwrap_or_default()
				.into_iter()
				.filter_map(|v| v.as_bytes().cloned())
				.collect();

			let reply = match execute(&state, id, &args).await {
				Reply::Value(v) => v.encode().unwrap(),
				Reply::Raw(raw) => Bytes::from_static(raw),
				Reply::Quit => {
					let _ = socket.write_all(b"+OK\r\n").await;
					let _ = socket.flush().await;
					break 'conn;
				}
			};
			if socket.write_all(&reply).await.is_err() || socket.flush().await.is_err() {
				break 'conn;
			}
		}
	}

	state.clients.lock().unwrap().remove(&id);
}

enum Reply {
	Value(RespValue),
	Raw(&'static [u8]),
	Quit,
}

fn ok() -> Reply {
	Reply::Value(RespValue::simple_string("OK"))
}

fn err(msg: impl Into<String>) -> Reply {
	Reply::Value(RespValue::error(msg.into()))
}

fn wrong_args(name: &str) -> Reply {
	err(format!(
		"ERR wrong number of arguments for '{}' command",
		name.to_lowercase()
	))
}

fn text(b: &Bytes) -> String {
	String::from_utf8_lossy(b).into_owned()
}

async fn execute(state: &State, id: i64, args: &[Bytes]) -> Reply {
	let Some(name) = args.first() else {
		return err("ERR empty command");
	};
	let name = text(name).to_uppercase();
	let args = &args[1..];
	let db = state.clients.lock().unwrap()[&id].db;

	match (name.as_str(), args) {
		("PING", []) => Reply::Value(RespValue::simple_string("PONG")),
		("PING", [msg]) => Reply::Value(RespValue::BulkString(msg.clone())),
		("ECHO", [msg]) => Reply::Value(RespValue::BulkString(msg.clone())),
		("AUTH", [_pass]) => err(NO_PASSWORD_ERR),
		("AUTH", [user, pass]) => match state.users.get(&text(user)) {
			Some(expected) if expected.as_bytes() == &pass[..] => ok(),
			_ => err(WRONGPASS_ERR),
		},
		("SELECT", [index]) => match text(index).parse::<u32>() {
			Ok(index) if index < DATABASES => {
				state.clients.lock().unwrap().get_mut(&id).unwrap().db = index;
				ok()
			}
			Ok(_) => err("ERR DB index is out of range"),
			Err(_) => err("ERR value is not an integer or out of range"),
		},
		("SET", [key, value]) => {
			state
				.strings
				.lock()
				.unwrap()
				.insert((db, key.clone()), value.clone());
			ok()
		}
		("GET", [key]) => match state.strings.lock().unwrap().get(&(db, key.clone())) {
			Some(v) => Reply::Value(RespValue::BulkString(v.clone())),
			None => Reply::Raw(b"$-1\r\n"),
		},
		("RPUSH", [key, values @ ..]) if !values.is_empty() => {
			let len = {
				let mut lists = state.lists.lock().unwrap();
				let list = lists.entry((db, key.clone())).or_default();
				list.extend(values.iter().cloned());
				list.len()
			};
			state.pushed.notify_waiters();
			Reply::Value(RespValue::Integer(len as i64))
		}
		("BLPOP", [key, timeout]) => blpop(state, id, db, key, timeout).await,
		("CLIENT", [sub, rest @ ..]) => client(state, id, &text(sub).to_uppercase(), rest),
		("GARBAGE", []) => Reply::Raw(b"?this is not resp\r\n"),
		("QUIT", []) => Reply::Quit,
		(
			"PING" | "ECHO" | "AUTH" | "SELECT" | "SET" | "GET" | "RPUSH" | "BLPOP" | "CLIENT",
			_,
		) => wrong_args(&name),
		_ => err(format!(
			"ERR unknown command '{}', with args beginning with: ",
			name.to_lowercase()
		)),
	}
}

async fn blpop(state: &State, id: i64, db: u32, key: &Bytes, timeout: &Bytes) -> Reply {
	let Ok(secs) = text(timeout).parse::<f64>() else {
		return err("ERR timeout is not a float or out of range");
	};
	let (tx, mut unblocked) = oneshot::channel();
	state.clients.lock().unwrap().get_mut(&id).unwrap().blocked = Some(tx);

	let deadline = (secs > 0.0).then(|| tokio::time::Instant::now() + Duration::from_secs_f64(secs));
	let reply = loop {
		let pushed = state.pushed.notified();
		tokio::pin!(pushed);
		pushed.as_mut().enable();

		let popped = state
			.lists
			.lock()
			.unwrap()
			.get_mut(&(db, key.clone()))
			.and_then(|list| list.pop_front());
		if let Some(value) = popped {
			break Reply::Value(RespValue::Array(vec![
				RespValue::BulkString(key.clone()),
				RespValue::BulkString(value),
			]));
		}

		let expired = async {
			match deadline {
				Some(at) => tokio::time::sleep_until(at).await,
				None => std::future::pending().await,
			}
		};
		tokio::select! {
			how = &mut unblocked => match how {
				Ok(Unblock::Error) => {
					break err("UNBLOCKED client unblocked via CLIENT UNBLOCK");
				}
				_ => break Reply::Raw(b"*-1\r\n"),
			},
			_ = &mut pushed => continue,
			_ = expired => break Reply::Raw(b"*-1\r\n"),
		}
	};

	if let Some(client) = state.clients.lock().unwrap().get_mut(&id) {
		client.blocked = None;
	}
	reply
}

fn client(state: &State, id: i64, sub: &str, args: &[Bytes]) -> Reply {
	let mut clients = state.clients.lock().unwrap();
	match (sub, args) {
		("ID", []) => Reply::Value(RespValue::Integer(id)),
		("SETNAME", [name]) => {
			clients.get_mut(&id).unwrap().name = text(name);
			ok()
		}
		("GETNAME", []) => {
			let name = &clients[&id].name;
			if name.is_empty() {
				Reply::Raw(b"$-1\r\n")
			} else {
				Reply::Value(RespValue::bulk_string(name.clone()))
			}
		}
		("LIST", []) => {
			let mut ids: Vec<_> = clients.keys().copied().collect();
			ids.sort();
			let mut list = String::new();
			for cid in ids {
				let c = &clients[&cid];
				list.push_str(&format!(
					"id={} addr={} name={} db={} cmd=client|list\n",
					cid, c.addr, c.name, c.db
				));
			}
			Reply::Value(RespValue::bulk_string(list))
		}
		("UNBLOCK", [target, rest @ ..]) => {
			let how = match rest {
				[] => Unblock::Timeout,
				[mode] if text(mode).eq_ignore_ascii_case("timeout") => Unblock::Timeout,
				[mode] if text(mode).eq_ignore_ascii_case("error") => Unblock::Error,
				_ => return err("ERR CLIENT UNBLOCK reason should be TIMEOUT or ERROR"),
			};
			let Ok(target) = text(target).parse::<i64>() else {
				return err("ERR value is not an integer or out of range");
			};
			let released = clients
				.get_mut(&target)
				.and_then(|c| c.blocked.take())
				.map(|tx| tx.send(how).is_ok())
				.unwrap_or(false);
			Reply::Value(RespValue::Integer(released as i64))
		}
		_ => err(format!(
			"ERR unknown subcommand '{}'.",
			sub.to_lowercase()
		)),
	}
}
