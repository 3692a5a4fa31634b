use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use log::debug;
use rustls::ClientConfig;
use rustls::RootCertStore;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::Error;
use crate::Result;
use crate::config::TlsConfig;
use crate::stream::AnyStream;

/// Build a connector trusting the webpki roots plus any configured CA file.
pub(crate) fn connector(config: &TlsConfig) -> Result<TlsConnector> {
	let mut root_cert_store = RootCertStore::empty();
	root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

	if let Some(path) = &config.ca_cert {
		let file = File::open(path)
			.map_err(|e| Error::Tls(format!("cannot open CA file {}: {}", path.display(), e)))?;
		let certs = rustls_pemfile::certs(&mut BufReader::new(file))
			.collect::<Result<Vec<_>, _>>()
			.map_err(|e| Error::Tls(format!("cannot read CA file {}: {}", path.display(), e)))?;
		if certs.is_empty() {
			return Err(Error::Tls(format!(
				"no certificates found in {}",
				path.display()
			)));
		}
		for cert in certs {
			root_cert_store
				.add(cert)
				.map_err(|e| Error::Tls(format!("invalid CA certificate: {}", e)))?;
		}
	}

	let tls_config = ClientConfig::builder()
		.with_root_certificates(root_cert_store)
		.with_no_client_auth();
	Ok(TlsConnector::from(Arc::new(tls_config)))
}

pub(crate) async fn connect(tcp: TcpStream, host: &str, config: &TlsConfig) -> Result<AnyStream> {
	let name = config.server_name.as_deref().unwrap_or(host);
	let domain = ServerName::try_from(name.to_string())
		.map_err(|_| Error::Tls(format!("invalid server name {:?}", name)))?;

	debug!("Starting TLS handshake with {}", name);
	let tls_stream = connector(config)?
		.connect(domain, tcp)
		.await
		.map_err(|e| Error::Tls(format!("handshake failed: {}", e)))?;
	Ok(AnyStream::from(tls_stream))
}
