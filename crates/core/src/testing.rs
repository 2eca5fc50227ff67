//! In-memory array used by unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Method;
use serde_json::{Value, json};
use stor_runtime::{Error, Result, TlsSettings, Transport, TransportFuture, TransportRequest};

use crate::config::ClientConfig;
use crate::secrets::{Collaborators, MemoryStore, Secret, SecretRef};

pub(crate) const BASE_A: &str = "https://array-a:8088/deviceManager/rest";
pub(crate) const BASE_B: &str = "https://array-b:8088/deviceManager/rest";
pub(crate) const DEVICE_ID: &str = "2102351234";

type Handler = Box<dyn FnMut(&TransportRequest) -> Result<Value> + Send>;

struct FakeState {
	unreachable: Vec<String>,
	current_token: Option<String>,
	issued: usize,
	login_reply: Option<Value>,
	handler: Option<Handler>,
	requests: Vec<TransportRequest>,
	untrusted: bool,
	trust_on_reload: bool,
}

/// Simulated array: issues `tok-N` tokens, rejects stale tokens with `-401`, and
/// hands every other authenticated request to a test-supplied handler.
pub(crate) struct FakeArray {
	state: Mutex<FakeState>,
	logins: AtomicUsize,
	logouts: AtomicUsize,
	tls_reloads: AtomicUsize,
	latency: Duration,
}

impl FakeArray {
	pub(crate) fn new() -> Arc<Self> {
		Self::with_latency(Duration::ZERO)
	}

	pub(crate) fn with_latency(latency: Duration) -> Arc<Self> {
		Arc::new(Self {
			state: Mutex::new(FakeState {
				unreachable: Vec::new(),
				current_token: None,
				issued: 0,
				login_reply: None,
				handler: None,
				requests: Vec::new(),
				untrusted: false,
				trust_on_reload: false,
			}),
			logins: AtomicUsize::new(0),
			logouts: AtomicUsize::new(0),
			tls_reloads: AtomicUsize::new(0),
			latency,
		})
	}

	pub(crate) fn set_unreachable(&self, base: &str) {
		self.state.lock().unreachable.push(base.to_string());
	}

	pub(crate) fn set_login_reply(&self, reply: Value) {
		self.state.lock().login_reply = Some(reply);
	}

	pub(crate) fn set_handler(&self, handler: impl FnMut(&TransportRequest) -> Result<Value> + Send + 'static) {
		self.state.lock().handler = Some(Box::new(handler));
	}

	/// Fails every request with a certificate error. With `trust_on_reload`, the
	/// next TLS reload clears the failure.
	pub(crate) fn reject_certificates(&self, trust_on_reload: bool) {
		let mut state = self.state.lock();
		state.untrusted = true;
		state.trust_on_reload = trust_on_reload;
	}

	pub(crate) fn tls_reloads(&self) -> usize {
		self.tls_reloads.load(Ordering::SeqCst)
	}

	/// Forgets the live token so every request carrying it gets `-401`.
	pub(crate) fn expire_session(&self) {
		self.state.lock().current_token = None;
	}

	pub(crate) fn logins(&self) -> usize {
		self.logins.load(Ordering::SeqCst)
	}

	pub(crate) fn logouts(&self) -> usize {
		self.logouts.load(Ordering::SeqCst)
	}

	pub(crate) fn requests(&self) -> Vec<TransportRequest> {
		self.state.lock().requests.clone()
	}

	/// Requests other than login and logout.
	pub(crate) fn api_requests(&self) -> Vec<TransportRequest> {
		self.requests().into_iter().filter(|request| !request.url.ends_with("/sessions")).collect()
	}

	fn respond(&self, request: TransportRequest) -> Result<Value> {
		let mut state = self.state.lock();
		state.requests.push(request.clone());

		if state.untrusted {
			return Err(Error::Certificate(format!("{} {}: invalid peer certificate: UnknownIssuer", request.method, request.url)));
		}

		if state.unreachable.iter().any(|base| request.url.starts_with(base.as_str())) {
			return Err(Error::Transport(format!("{} {}: connection refused", request.method, request.url)));
		}

		if request.method == Method::POST && request.url.ends_with("/xxxxx/sessions") {
			self.logins.fetch_add(1, Ordering::SeqCst);
			if let Some(reply) = state.login_reply.clone() {
				return Ok(reply);
			}
			state.issued += 1;
			let token = format!("tok-{}", state.issued);
			state.current_token = Some(token.clone());
			return Ok(json!({
				"error": {"code": 0},
				"data": {"deviceid": DEVICE_ID, "iBaseToken": token, "accountstate": 1}
			}));
		}

		if request.method == Method::DELETE && request.url.ends_with("/sessions") {
			self.logouts.fetch_add(1, Ordering::SeqCst);
			return Ok(json!({"error": {"code": 0}}));
		}

		if request.token.is_none() || request.token != state.current_token {
			return Ok(json!({"error": {"code": -401, "description": "unauthorized"}}));
		}

		match state.handler.as_mut() {
			Some(handler) => handler(&request),
			None => Ok(json!({"error": {"code": 0}, "data": {}})),
		}
	}
}

impl Transport for FakeArray {
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			if !self.latency.is_zero() {
				tokio::time::sleep(self.latency).await;
			}
			self.respond(request)
		})
	}

	fn reload_tls(&self, _tls: &TlsSettings) -> Result<()> {
		self.tls_reloads.fetch_add(1, Ordering::SeqCst);
		let mut state = self.state.lock();
		if state.trust_on_reload {
			state.untrusted = false;
		}
		Ok(())
	}
}

pub(crate) fn secret_ref() -> SecretRef {
	SecretRef::new("storage", "array-admin")
}

pub(crate) fn config() -> ClientConfig {
	let mut config = ClientConfig::new([BASE_A, BASE_B], "admin").with_secret(secret_ref());
	config.retry.delay_ms = 1;
	config
}

pub(crate) fn store() -> Arc<MemoryStore> {
	let store = Arc::new(MemoryStore::new());
	store.insert_secret(secret_ref(), Secret::new("hunter2", None));
	store
}

pub(crate) fn collaborators() -> Collaborators {
	Collaborators::new(store())
}

pub(crate) fn ok(data: Value) -> Result<Value> {
	Ok(json!({"error": {"code": 0}, "data": data}))
}

pub(crate) fn failure(code: i64) -> Result<Value> {
	Ok(json!({"error": {"code": code, "description": format!("failure {code}")}}))
}
