//! Logging setup shared by the client binaries and test harnesses.
//!
//! Library crates in this workspace only emit through the `log` facade;
//! this crate installs the `tracing-subscriber` pipeline that prints them.

pub mod error;
pub mod logger;

pub use error::TelemetryError;
pub use logger::init;
pub use logger::reload_log_level;
