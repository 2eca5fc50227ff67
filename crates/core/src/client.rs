//! The array client: one shared session, a bounded number of requests in flight,
//! and transparent recovery from expired sessions and busy controllers.
//!
//! Every logical call goes through the same pipeline:
//!
//! 1. the operation is resolved through the [`EndpointRegistry`]
//! 2. an admission slot is leased for the duration of the HTTP exchange
//! 3. the reply is validated into an [`Envelope`] and classified
//! 4. `-401` (or a network failure) relogs in once and redrives the whole call;
//!    a rejected certificate rebuilds TLS once and redrives
//! 5. busy codes are redriven by [`retry_call`] under the call's [`RetryPolicy`]

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use stor_protocol::{Envelope, Payload};
use stor_runtime::{AdmissionGate, Attempt, Error, HttpTransport, Result, RetryPolicy, Transport, TransportRequest, retry_call};
use tracing::{debug, info, warn};

use crate::classify::{Verdict, classify};
use crate::config::ClientConfig;
use crate::registry::{Args, EndpointRegistry, append_query, compose_url};
use crate::secrets::Collaborators;
use crate::session::{Route, SessionManager, SessionState, resolve_tls};

/// One logical call.
#[derive(Debug, Clone)]
pub struct Request {
	operation: String,
	method: Method,
	args: Args,
	query: Vec<(String, String)>,
	body: Option<Arc<Value>>,
	retry: Option<RetryPolicy>,
	idempotent_codes: Vec<i64>,
}

impl Request {
	pub fn new(method: Method, operation: impl Into<String>) -> Self {
		Self {
			operation: operation.into(),
			method,
			args: Args::new(),
			query: Vec::new(),
			body: None,
			retry: None,
			idempotent_codes: Vec::new(),
		}
	}

	pub fn get(operation: impl Into<String>) -> Self {
		Self::new(Method::GET, operation)
	}

	pub fn post(operation: impl Into<String>) -> Self {
		Self::new(Method::POST, operation)
	}

	pub fn put(operation: impl Into<String>) -> Self {
		Self::new(Method::PUT, operation)
	}

	pub fn delete(operation: impl Into<String>) -> Self {
		Self::new(Method::DELETE, operation)
	}

	pub fn arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.args.insert(name.into(), value.into());
		self
	}

	pub fn args(mut self, args: Args) -> Self {
		self.args.extend(args);
		self
	}

	/// Appends `name=value` to the resolved path.
	pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((name.into(), value.into()));
		self
	}

	pub fn body(mut self, body: Value) -> Self {
		self.body = Some(Arc::new(body));
		self
	}

	/// Overrides the client's default retry policy for this call.
	pub fn retry(mut self, policy: RetryPolicy) -> Self {
		self.retry = Some(policy);
		self
	}

	/// Failure codes that mean "already in the requested state" for this call.
	pub fn idempotent(mut self, codes: &[i64]) -> Self {
		self.idempotent_codes.extend_from_slice(codes);
		self
	}

	pub fn operation(&self) -> &str {
		&self.operation
	}

	pub fn method(&self) -> &Method {
		&self.method
	}
}

struct ClientInner {
	registry: Arc<EndpointRegistry>,
	session: SessionManager,
	gate: AdmissionGate,
	retry: RetryPolicy,
	transport: Arc<dyn Transport>,
}

/// Shared handle to one array. Clones share the session, gate and transport.
#[derive(Clone)]
pub struct ArrayClient {
	inner: Arc<ClientInner>,
}

impl ArrayClient {
	/// Builds a client with the standard registry and an HTTPS transport. No
	/// request is sent; the first call logs in.
	pub async fn new(config: ClientConfig, collaborators: Collaborators) -> Result<Self> {
		let tls = resolve_tls(&config, &collaborators).await?;
		let transport = Arc::new(HttpTransport::new(&tls, config.request_timeout())?);
		let registry = Arc::new(EndpointRegistry::standard()?);
		Ok(Self::with_transport(config, registry, collaborators, transport))
	}

	/// Like [`new`](Self::new), then logs in.
	pub async fn connect(config: ClientConfig, collaborators: Collaborators) -> Result<Self> {
		let client = Self::new(config, collaborators).await?;
		client.login().await?;
		Ok(client)
	}

	pub fn with_transport(config: ClientConfig, registry: Arc<EndpointRegistry>, collaborators: Collaborators, transport: Arc<dyn Transport>) -> Self {
		let gate = AdmissionGate::new(config.max_concurrency);
		let retry = config.retry.policy();
		let session = SessionManager::new(config, transport.clone(), gate.clone(), collaborators);
		Self {
			inner: Arc::new(ClientInner {
				registry,
				session,
				gate,
				retry,
				transport,
			}),
		}
	}

	/// Opens a session. A rejected certificate rebuilds TLS once and logs in again.
	pub async fn login(&self) -> Result<()> {
		match self.inner.session.login().await {
			Err(err) if err.is_certificate() => {
				self.rebuild_tls("login", err).await?;
				self.inner.session.login().await
			}
			other => other,
		}
	}

	/// Logs out. A later call opens a new session.
	pub async fn close(&self) {
		self.inner.session.logout().await;
		info!(target = "stor.client", "client closed");
	}

	pub fn session(&self) -> &SessionManager {
		&self.inner.session
	}

	pub fn registry(&self) -> &EndpointRegistry {
		&self.inner.registry
	}

	pub fn gate(&self) -> &AdmissionGate {
		&self.inner.gate
	}

	pub fn retry_policy(&self) -> &RetryPolicy {
		&self.inner.retry
	}

	pub fn state(&self) -> SessionState {
		self.inner.session.state()
	}

	pub fn base_url(&self) -> Option<String> {
		self.inner.session.base_url()
	}

	pub fn device_id(&self) -> Option<String> {
		self.inner.session.device_id()
	}

	pub fn vstore_name(&self) -> Option<String> {
		self.inner.session.vstore_name()
	}

	/// Shorthand for [`execute`](Self::execute) with the default policy.
	pub async fn call(&self, method: Method, operation: &str, args: Args, body: Option<Value>) -> Result<Payload> {
		let mut request = Request::new(method, operation).args(args);
		if let Some(body) = body {
			request = request.body(body);
		}
		self.execute(&request).await
	}

	/// Runs one logical call to completion and returns its payload or the last
	/// failure.
	pub async fn execute(&self, request: &Request) -> Result<Payload> {
		self.inner.registry.resolve(&request.operation, &request.args)?;

		let policy = request.retry.as_ref().unwrap_or(&self.inner.retry);
		retry_call(policy, || self.attempt(request, policy)).await
	}

	/// One retry-engine unit: dispatch plus at most one relogin and one TLS rebuild.
	async fn attempt(&self, request: &Request, policy: &RetryPolicy) -> Attempt<Payload> {
		let mut relogged = false;
		let mut tls_rebuilt = false;

		loop {
			let route = match self.inner.session.ensure_route().await {
				Ok(route) => route,
				Err(err) if err.is_certificate() && !tls_rebuilt => {
					tls_rebuilt = true;
					if let Err(err) = self.rebuild_tls(&request.operation, err).await {
						return Attempt::unclassified(Err(err));
					}
					continue;
				}
				Err(err) => return Attempt::unclassified(Err(err)),
			};

			match self.dispatch(request, &route).await {
				Ok(envelope) => match classify(envelope, policy, &request.idempotent_codes) {
					Verdict::NeedsRelogin { .. } if !relogged => {
						debug!(target = "stor.client", operation = %request.operation, "session rejected; logging in again");
					}
					verdict => {
						let code = verdict.code();
						return Attempt::classified(code, verdict.into_result(&request.operation));
					}
				},
				Err(err) if err.is_certificate() && !tls_rebuilt => {
					tls_rebuilt = true;
					if let Err(err) = self.rebuild_tls(&request.operation, err).await {
						return Attempt::unclassified(Err(err));
					}
					continue;
				}
				Err(err) if err.is_transport() && !relogged => {
					warn!(target = "stor.client", operation = %request.operation, error = %err, "transport failure; logging in again");
				}
				Err(err) => return Attempt::unclassified(Err(err)),
			}

			relogged = true;
			match self.inner.session.relogin(&route.snapshot()).await {
				Ok(()) => {}
				Err(err) if err.is_certificate() && !tls_rebuilt => {
					tls_rebuilt = true;
					if let Err(err) = self.rebuild_tls(&request.operation, err).await {
						return Attempt::unclassified(Err(err));
					}
				}
				Err(err) => return Attempt::unclassified(Err(err)),
			}
		}
	}

	/// Re-reads trust material after `err` rejected the peer certificate. Returns
	/// `err` itself when the rebuild fails.
	async fn rebuild_tls(&self, operation: &str, err: Error) -> Result<()> {
		warn!(target = "stor.client", operation, error = %err, "certificate rejected; rebuilding TLS");
		match self.inner.session.rebuild_tls().await {
			Ok(()) => Ok(()),
			Err(rebuild) => {
				warn!(target = "stor.client", error = %rebuild, "TLS rebuild failed");
				Err(err)
			}
		}
	}

	async fn dispatch(&self, request: &Request, route: &Route) -> Result<Envelope> {
		let path = self.inner.registry.resolve(&request.operation, &request.args)?;
		let url = compose_url(&route.base_url, &route.device_id, &append_query(&path, &request.query))?;

		let mut outgoing = TransportRequest::new(request.method.clone(), url).with_token(route.token.clone());
		if let Some(body) = &request.body {
			outgoing = outgoing.with_body(Arc::clone(body));
		}

		debug!(target = "stor.client", operation = %request.operation, method = %request.method, url = %outgoing.url, "dispatching");
		let reply = {
			let _slot = self.inner.gate.acquire().await?;
			self.inner.transport.execute(outgoing).await?
		};
		Envelope::from_value(reply).map_err(Error::from)
	}
}

impl std::fmt::Debug for ArrayClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ArrayClient")
			.field("session", &self.inner.session)
			.field("operations", &self.inner.registry.len())
			.field("retry", &self.inner.retry)
			.finish_non_exhaustive()
	}
}
