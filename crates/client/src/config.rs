use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Options applied when dialing.
///
/// Every field that is set overrides the value of the same field parsed from
/// a connection URI. Unset fields fall back to the URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialConfig {
	pub auth_user: Option<String>,
	pub auth_pass: Option<String>,
	pub select_db: Option<u32>,
	/// Bound on the whole dial: connect, TLS and handshake.
	#[serde(with = "humantime_serde")]
	pub timeout: Option<Duration>,
	/// Enables TLS when present.
	pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
	/// Name checked against the server certificate. Defaults to the host.
	pub server_name: Option<String>,
	/// Extra PEM file of trusted CA certificates, on top of the webpki roots.
	pub ca_cert: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_deserialize_toml() {
		let config: DialConfig = toml::from_str(
			r#"
			auth_user = "alice"
			auth_pass = "secret"
			select_db = 3
			timeout = "1s 500ms"

			[tls]
			server_name = "cache.internal"
			"#,
		)
		.unwrap();

		assert_eq!(config.auth_user.as_deref(), Some("alice"));
		assert_eq!(config.auth_pass.as_deref(), Some("secret"));
		assert_eq!(config.select_db, Some(3));
		assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
		assert_eq!(
			config.tls,
			Some(TlsConfig {
				server_name: Some("cache.internal".to_string()),
				ca_cert: None,
			})
		);
	}

	#[test]
	fn test_missing_fields_default() {
		let config: DialConfig = serde_json::from_str("{}").unwrap();
		assert_eq!(config, DialConfig::default());
	}
}
