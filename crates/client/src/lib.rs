//! Single-connection RESP client.
//!
//! A [`Dialer`] opens a socket, authenticates and selects a database; the
//! resulting [`Conn`] sends [`Cmd`]s and decodes replies into any
//! [`FromResp`] type, either as round trips or through separate `send` and
//! `recv` calls that pair up in FIFO order.
//!
//! ```no_run
//! use client::Cmd;
//!
//! # async fn demo() -> client::Result<()> {
//! let conn = client::dial("tcp", "redis://127.0.0.1:6379/0").await?;
//! conn.run(&Cmd::new("SET").arg("greeting").arg("hello")).await?;
//! let value: Option<String> = conn.do_cmd(&Cmd::new("GET").arg("greeting")).await?;
//! assert_eq!(value.as_deref(), Some("hello"));
//! conn.close()?;
//! # Ok(())
//! # }
//! ```

mod cmd;
mod config;
mod conn;
mod dialer;
mod error;
pub mod hook;
mod reply;
mod stream;
mod tls;

pub use cmd::Cmd;
pub use cmd::IntoArg;
pub use cmd::cmd;
pub use config::DialConfig;
pub use config::TlsConfig;
pub use conn::Conn;
pub use dialer::DEFAULT_PORT;
pub use dialer::Dialer;
pub use dialer::Endpoint;
pub use dialer::Network;
pub use dialer::Target;
pub use dialer::dial;
pub use error::Error;
pub use error::Result;
pub use hook::DecodeHook;
pub use hook::SyncPoint;
pub use reply::FromResp;
pub use resp::RespValue;
pub use stream::AnyStream;
