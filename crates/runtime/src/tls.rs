//! TLS trust configuration for the HTTP transport.
//!
//! The trust material itself comes from outside (a certificate secret and a
//! "use certificate" flag); this module only turns it into a `reqwest` client.

use std::time::Duration;

use reqwest::Certificate;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// How the transport verifies the array's certificate.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
	/// When false the peer certificate is not verified at all.
	pub verify: bool,
	/// PEM bundle that replaces the built-in roots when present.
	pub ca_pem: Option<Vec<u8>>,
}

impl std::fmt::Debug for TlsSettings {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TlsSettings")
			.field("verify", &self.verify)
			.field("ca_pem_bytes", &self.ca_pem.as_ref().map(Vec::len))
			.finish()
	}
}

impl TlsSettings {
	/// Skip peer verification.
	pub fn insecure() -> Self {
		Self { verify: false, ca_pem: None }
	}

	/// Verify against the built-in web PKI roots.
	pub fn system_roots() -> Self {
		Self { verify: true, ca_pem: None }
	}

	/// Verify against the certificates in `pem` only.
	pub fn with_ca_pem(pem: impl Into<Vec<u8>>) -> Self {
		Self {
			verify: true,
			ca_pem: Some(pem.into()),
		}
	}
}

/// Parses a PEM bundle into a trust pool. A bundle without any certificate is an error.
pub fn parse_trust_pool(pem: &[u8]) -> Result<Vec<Certificate>> {
	let certificates = Certificate::from_pem_bundle(pem).map_err(|err| Error::TlsConfig(format!("invalid PEM bundle: {err}")))?;
	if certificates.is_empty() {
		return Err(Error::TlsConfig("no certificates found in PEM bundle".to_string()));
	}
	Ok(certificates)
}

/// Builds the HTTP client used by [`HttpTransport`](crate::transport::HttpTransport).
///
/// The client keeps a cookie store so session cookies set by the array are
/// replayed alongside the token header.
pub fn build_http_client(tls: &TlsSettings, timeout: Duration) -> Result<reqwest::Client> {
	let mut builder = reqwest::Client::builder().use_rustls_tls().cookie_store(true).timeout(timeout);

	if !tls.verify {
		warn!(target = "stor.transport", "peer certificate verification is disabled");
		builder = builder.danger_accept_invalid_certs(true);
	} else if let Some(pem) = &tls.ca_pem {
		let certificates = parse_trust_pool(pem)?;
		debug!(target = "stor.transport", count = certificates.len(), "using custom trust pool");
		builder = builder.tls_built_in_root_certs(false);
		for certificate in certificates {
			builder = builder.add_root_certificate(certificate);
		}
	}

	builder.build().map_err(|err| Error::TlsConfig(err.to_string()))
}
