//! Command-line and file configuration for `resp-cli`.
//!
//! Values are merged per field: an explicit flag wins over the config file,
//! which wins over the built-in default.

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

pub use clap::Parser;
use client::DialConfig;
use client::TlsConfig;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("Failed to read configuration file '{path}': {source}")]
	Io {
		source: std::io::Error,
		path: String,
	},

	#[error("Failed to parse TOML configuration: {0}")]
	TomlParse(#[from] toml::de::Error),

	#[error("Failed to parse JSON configuration: {0}")]
	JsonParse(#[from] serde_json::Error),

	#[error("Failed to parse YAML configuration: {0}")]
	YamlParse(#[from] serde_yaml::Error),

	#[error("Unsupported configuration format: {0}")]
	UnsupportedFormat(String),

	#[error("Configuration file has no extension")]
	NoExtension,
}

/// Send one command to a RESP server and print the reply
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
	/// Configuration file path (TOML, JSON, or YAML)
	#[arg(short, long)]
	pub config: Option<PathBuf>,

	/// Server address: host:port, a socket path, or a redis:// URI
	#[arg(short, long)]
	pub addr: Option<String>,

	/// Network: tcp, tcp4, tcp6 or unix
	#[arg(long)]
	pub network: Option<String>,

	/// Username for AUTH
	#[arg(short, long)]
	pub user: Option<String>,

	/// Password for AUTH
	#[arg(short, long)]
	pub pass: Option<String>,

	/// Database index to SELECT
	#[arg(short = 'n', long)]
	pub db: Option<u32>,

	/// Bound on connect and handshake, e.g. "500ms" or "2s"
	#[arg(short, long, value_parser = humantime_serde::re::humantime::parse_duration)]
	pub timeout: Option<Duration>,

	/// Connect over TLS
	#[arg(long)]
	pub tls: bool,

	/// Name to verify in the server certificate
	#[arg(long)]
	pub tls_server_name: Option<String>,

	/// PEM file with extra trusted CA certificates
	#[arg(long)]
	pub ca_cert: Option<PathBuf>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long)]
	pub log_level: Option<String>,

	/// The command and its arguments
	#[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
	pub command: Vec<String>,
}

/// Settings loadable from a config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CliConfig {
	pub addr: String,
	pub network: String,
	pub log_level: String,
	pub dial: DialConfig,
}

impl Default for CliConfig {
	fn default() -> Self {
		Self {
			addr: format!("127.0.0.1:{}", client::DEFAULT_PORT),
			network: "tcp".into(),
			log_level: "warn".into(),
			dial: DialConfig::default(),
		}
	}
}

/// Build the effective configuration from the file named by `--config` and
/// the remaining flags.
pub fn setup(args: &Cli) -> Result<CliConfig, ConfigError> {
	let mut config = match &args.config {
		Some(path) => load_from_file(path)?,
		None => CliConfig::default(),
	};
	apply_overrides(&mut config, args);
	Ok(config)
}

fn apply_overrides(config: &mut CliConfig, args: &Cli) {
	if let Some(addr) = &args.addr {
		config.addr = addr.clone();
	}
	if let Some(network) = &args.network {
		config.network = network.clone();
	}
	if let Some(level) = &args.log_level {
		config.log_level = level.clone();
	}

	let dial = &mut config.dial;
	if let Some(user) = &args.user {
		dial.auth_user = Some(user.clone());
	}
	if let Some(pass) = &args.pass {
		dial.auth_pass = Some(pass.clone());
	}
	if let Some(db) = args.db {
		dial.select_db = Some(db);
	}
	if let Some(timeout) = args.timeout {
		dial.timeout = Some(timeout);
	}

	if args.tls || args.tls_server_name.is_some() || args.ca_cert.is_some() {
		let tls = dial.tls.get_or_insert_with(TlsConfig::default);
		if let Some(name) = &args.tls_server_name {
			tls.server_name = Some(name.clone());
		}
		if let Some(ca) = &args.ca_cert {
			tls.ca_cert = Some(ca.clone());
		}
	}
}

fn load_from_file<P: AsRef<Path>>(path: P) -> Result<CliConfig, ConfigError> {
	let path_ref = path.as_ref();
	let content = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
		path: path_ref.display().to_string(),
		source,
	})?;

	let extension = path_ref
		.extension()
		.and_then(|ext| ext.to_str())
		.ok_or(ConfigError::NoExtension)?;

	match extension.to_lowercase().as_str() {
		"toml" => Ok(toml::from_str(&content)?),
		"json" => Ok(serde_json::from_str(&content)?),
		"yaml" | "yml" => Ok(serde_yaml::from_str(&content)?),
		_ => Err(ConfigError::UnsupportedFormat(extension.to_string())),
	}
}
