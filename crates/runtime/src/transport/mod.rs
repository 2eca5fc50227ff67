//! HTTP transport to the array's REST endpoint.
//!
//! A [`Transport`] executes one request and hands back the decoded JSON body.
//! It does not interpret the envelope: status classification, relogin and
//! retries happen above it. [`HttpTransport`] is the production implementation
//! on top of `reqwest`; tests substitute scripted transports through the trait.

pub mod summary;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reqwest::Method;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::{Level, debug};

use crate::error::{Error, Result};
use crate::tls::{TlsSettings, build_http_client};

/// Header that carries the session token on every authenticated request.
pub const TOKEN_HEADER: &str = "iBaseToken";

/// Boxed future returned by [`Transport`] methods.
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;

/// One fully resolved request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
	pub method: Method,
	pub url: String,
	/// Shared so that redrives and endpoint failover do not copy the body.
	pub body: Option<Arc<Value>>,
	/// Session token; omitted from the request when `None` or empty.
	pub token: Option<String>,
}

impl TransportRequest {
	pub fn new(method: Method, url: impl Into<String>) -> Self {
		Self {
			method,
			url: url.into(),
			body: None,
			token: None,
		}
	}

	pub fn with_body(mut self, body: impl Into<Arc<Value>>) -> Self {
		self.body = Some(body.into());
		self
	}

	pub fn with_token(mut self, token: impl Into<String>) -> Self {
		self.token = Some(token.into());
		self
	}
}

/// Executes requests against the array.
pub trait Transport: Send + Sync {
	/// Sends `request` and returns the parsed JSON body, whatever the HTTP status.
	///
	/// Network failures map to [`Error::Transport`], rejected peer certificates to
	/// [`Error::Certificate`], and bodies that are not JSON to [`Error::Transport`].
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_>;

	/// Replaces the TLS trust configuration used by subsequent requests.
	fn reload_tls(&self, tls: &TlsSettings) -> Result<()> {
		let _ = tls;
		Ok(())
	}
}

/// `reqwest`-backed transport with a cookie store and a per-request timeout.
pub struct HttpTransport {
	client: RwLock<reqwest::Client>,
	timeout: Duration,
}

impl HttpTransport {
	pub fn new(tls: &TlsSettings, timeout: Duration) -> Result<Self> {
		Ok(Self {
			client: RwLock::new(build_http_client(tls, timeout)?),
			timeout,
		})
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	async fn send(&self, request: TransportRequest) -> Result<Value> {
		let client = self.client.read().clone();
		let TransportRequest { method, url, body, token } = request;

		if tracing::enabled!(Level::DEBUG) {
			debug!(target = "stor.transport", %method, %url, body = %summary::redacted(body.as_deref()), "sending request");
		}

		let mut builder = client.request(method.clone(), &url).header(ACCEPT, "application/json");
		if let Some(token) = token.as_deref().filter(|token| !token.is_empty()) {
			builder = builder.header(TOKEN_HEADER, token);
		}
		if let Some(body) = &body {
			builder = builder.json(&**body);
		}

		let started = Instant::now();
		let response = builder.send().await.map_err(|err| classify_send_error(&method, &url, &err))?;
		let status = response.status();
		let bytes = response
			.bytes()
			.await
			.map_err(|err| Error::Transport(format!("{method} {url}: failed to read response body: {err}")))?;

		if tracing::enabled!(Level::DEBUG) {
			debug!(
				target = "stor.transport",
				%method,
				%url,
				status = status.as_u16(),
				elapsed_ms = started.elapsed().as_millis() as u64,
				body = %summary::summarize(&bytes),
				"received response"
			);
		}

		serde_json::from_slice(&bytes).map_err(|err| Error::Transport(format!("{method} {url}: HTTP {status} body is not JSON: {err}")))
	}
}

impl Transport for HttpTransport {
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
		Box::pin(self.send(request))
	}

	fn reload_tls(&self, tls: &TlsSettings) -> Result<()> {
		let client = build_http_client(tls, self.timeout)?;
		*self.client.write() = client;
		debug!(target = "stor.transport", verify = tls.verify, "reloaded TLS configuration");
		Ok(())
	}
}

fn classify_send_error(method: &Method, url: &str, err: &reqwest::Error) -> Error {
	let message = format!("{method} {url}: {}", error_chain(err));
	if is_certificate_error(err) {
		Error::Certificate(message)
	} else {
		Error::Transport(message)
	}
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
	let mut rendered = err.to_string();
	let mut source = err.source();
	while let Some(cause) = source {
		rendered.push_str(": ");
		rendered.push_str(&cause.to_string());
		source = cause.source();
	}
	rendered
}

/// Returns true when any error in the chain reports a rejected peer certificate.
pub fn is_certificate_error(err: &(dyn std::error::Error + 'static)) -> bool {
	let mut current = Some(err);
	while let Some(cause) = current {
		let text = cause.to_string();
		let lower = text.to_ascii_lowercase();
		if lower.contains("certificate") || lower.contains("unknownissuer") || lower.contains("x509") {
			return true;
		}
		current = cause.source();
	}
	false
}
