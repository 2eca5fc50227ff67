//! Session lifecycle: login with endpoint failover, de-duplicated relogin, logout.
//!
//! # State machine
//!
//! ```text
//! Unauthenticated ──login──► Authenticating ──ok──► Active
//!        ▲                         │                  │
//!        └────────── failure ──────┘           -401 / transport error
//!                                                     ▼
//! LoggedOut ◄──close── Active ◄──── ok ──────── ReloggingIn
//! ```
//!
//! # Relogin de-duplication
//!
//! Callers that see the session rejected pass the [`TokenSnapshot`] they sent with
//! the failed request to [`SessionManager::relogin`]. The relogin guard admits one
//! caller at a time; a caller whose snapshot no longer matches the live token
//! returns at once, because somebody else already refreshed the session. Only the
//! guard holder mutates the session's base URL, device id and token.

mod state;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::Method;
use serde_json::Value;
use stor_protocol::login::DEVICELESS_SEGMENT;
use stor_protocol::{AccountState, Envelope, LoginRequest, LoginResponse, LoginResponseError, codes};
use stor_runtime::{AdmissionGate, Error, Result, TlsSettings, Transport, TransportRequest};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

pub use self::state::{ClientSession, Route, SessionState, TokenSnapshot};
use crate::config::ClientConfig;
use crate::secrets::{Collaborators, Secret, SecretRef};

/// Owns the client's session and every network call that changes it.
pub struct SessionManager {
	config: ClientConfig,
	transport: Arc<dyn Transport>,
	gate: AdmissionGate,
	collaborators: Collaborators,
	session: RwLock<ClientSession>,
	secret_ref: RwLock<Option<SecretRef>>,
	relogin_guard: Mutex<()>,
}

impl SessionManager {
	pub fn new(config: ClientConfig, transport: Arc<dyn Transport>, gate: AdmissionGate, collaborators: Collaborators) -> Self {
		let session = ClientSession::new(config.base_urls.clone(), config.username.clone());
		let secret_ref = config.secret.clone();
		Self {
			config,
			transport,
			gate,
			collaborators,
			session: RwLock::new(session),
			secret_ref: RwLock::new(secret_ref),
			relogin_guard: Mutex::new(()),
		}
	}

	pub fn state(&self) -> SessionState {
		self.session.read().state
	}

	/// Copy of the current session for inspection.
	pub fn session(&self) -> ClientSession {
		self.session.read().clone()
	}

	pub fn base_url(&self) -> Option<String> {
		self.session.read().base_url.clone()
	}

	pub fn device_id(&self) -> Option<String> {
		self.session.read().device_id.clone()
	}

	pub fn vstore_name(&self) -> Option<String> {
		self.session.read().vstore_name.clone()
	}

	pub fn token_snapshot(&self) -> TokenSnapshot {
		self.session.read().snapshot()
	}

	/// Where and with which token to send the next request, if logged in.
	pub fn route(&self) -> Option<Route> {
		self.session.read().route()
	}

	/// Returns the live route, logging in first when there is no session.
	pub async fn ensure_route(&self) -> Result<Route> {
		if let Some(route) = self.route() {
			return Ok(route);
		}
		self.relogin(&TokenSnapshot::empty()).await?;
		self.route().ok_or(Error::NotAuthenticated {
			code: codes::NO_AUTHENTICATION,
		})
	}

	/// Opens a new session, replacing any existing one without logging it out.
	pub async fn login(&self) -> Result<()> {
		let _guard = self.relogin_guard.lock().await;
		self.login_locked().await
	}

	/// Replaces the session the caller saw as `snapshot`.
	///
	/// Returns without network traffic when the live token already differs from
	/// `snapshot`. Otherwise the old session is logged out (best effort) and a new
	/// one is opened.
	pub async fn relogin(&self, snapshot: &TokenSnapshot) -> Result<()> {
		let _guard = self.relogin_guard.lock().await;

		if self.token_snapshot() != *snapshot {
			debug!(target = "stor.session", "session already refreshed by another caller");
			return Ok(());
		}

		let had_session = {
			let mut session = self.session.write();
			let had_session = session.token.is_some();
			if had_session {
				session.state = SessionState::ReloggingIn;
			}
			had_session
		};

		if had_session {
			info!(target = "stor.session", "session rejected; logging in again");
			self.logout_locked().await;
		}
		self.login_locked().await
	}

	/// Closes the session. Failures are logged and otherwise ignored.
	pub async fn logout(&self) {
		let _guard = self.relogin_guard.lock().await;
		self.logout_locked().await;
		self.session.write().state = SessionState::LoggedOut;
	}

	/// Re-reads trust material and installs it in the transport.
	pub async fn rebuild_tls(&self) -> Result<()> {
		let tls = resolve_tls(&self.config, &self.collaborators).await?;
		self.transport.reload_tls(&tls)?;
		info!(target = "stor.session", verify = tls.verify, "rebuilt TLS configuration");
		Ok(())
	}

	async fn login_locked(&self) -> Result<()> {
		{
			let mut session = self.session.write();
			if session.state != SessionState::ReloggingIn {
				session.state = SessionState::Authenticating;
			}
		}

		let result = self.open_session().await;
		if let Err(err) = &result {
			warn!(target = "stor.session", error = %err, "login failed");
			let mut session = self.session.write();
			session.clear_credentials();
			session.state = SessionState::Unauthenticated;
		}
		result
	}

	async fn open_session(&self) -> Result<()> {
		let mut secret = self.fetch_secret().await?;
		let scope = secret.auth_mode().map(str::to_string).unwrap_or_else(|| self.config.scope.clone());
		let password = std::str::from_utf8(secret.password()).map_err(|_| Error::Secret("password is not valid UTF-8".to_string()))?;
		let body = Arc::new(serde_json::to_value(LoginRequest {
			username: &self.config.username,
			password,
			scope: &scope,
		})?);
		secret.wipe();

		let result = self.post_login(&body).await;
		scrub_password(body);

		let (base_url, reply) = result?;
		self.adopt(base_url, reply)
	}

	/// Tries each candidate in order; the first one that answers at all is adopted.
	///
	/// When no candidate answers and at least one rejected its certificate, the
	/// certificate error is returned so the caller can rebuild TLS.
	async fn post_login(&self, body: &Arc<Value>) -> Result<(String, Value)> {
		let candidates = self.session.read().candidates.clone();
		let mut last_error = None;
		let mut certificate_error = None;

		for base_url in &candidates {
			let url = format!("{}/{DEVICELESS_SEGMENT}/sessions", base_url.trim_end_matches('/'));
			let request = TransportRequest::new(Method::POST, url).with_body(Arc::clone(body));

			let slot = self.gate.acquire().await?;
			let outcome = self.transport.execute(request).await;
			slot.release();

			match outcome {
				Ok(reply) => return Ok((base_url.clone(), reply)),
				Err(err) if err.is_certificate() => {
					warn!(target = "stor.session", base_url = %base_url, error = %err, "login endpoint rejected certificate");
					certificate_error = Some(err);
				}
				Err(err) if err.is_transport() => {
					warn!(target = "stor.session", base_url = %base_url, error = %err, "login endpoint unreachable");
					last_error = Some(err);
				}
				Err(err) => return Err(err),
			}
		}

		if let Some(err) = certificate_error {
			return Err(err);
		}
		Err(Error::AllEndpointsUnreachable {
			attempted: candidates.len(),
			last_error: last_error.map_or_else(|| "no base URLs configured".to_string(), |err| err.to_string()),
		})
	}

	fn adopt(&self, base_url: String, reply: Value) -> Result<()> {
		let envelope = Envelope::from_value(reply)?;
		if !envelope.is_success() {
			return Err(Error::LoginRejected {
				url: base_url,
				code: envelope.code(),
				description: envelope.status.describe(),
			});
		}

		let data = envelope.data.as_object().ok_or(LoginResponseError::MissingData)?;
		let response = LoginResponse::from_object(data)?;
		match response.account_state {
			Some(state) if state.is_usable() => {}
			state => {
				return Err(Error::AccountStateInvalid {
					state: state.map(AccountState::code),
				});
			}
		}

		let mut session = self.session.write();
		session.vstore_name = response.vstore_name.or_else(|| self.config.vstore_name.clone());
		session.base_url = Some(base_url);
		session.device_id = Some(response.device_id);
		session.token = Some(response.token);
		session.state = SessionState::Active;

		info!(
			target = "stor.session",
			base_url = session.base_url.as_deref().unwrap_or_default(),
			device_id = session.device_id.as_deref().unwrap_or_default(),
			vstore = session.vstore_name.as_deref().unwrap_or_default(),
			username = %session.username,
			"session established"
		);
		Ok(())
	}

	async fn logout_locked(&self) {
		let Some(route) = self.route() else {
			return;
		};

		let url = format!("{}/{}/sessions", route.base_url.trim_end_matches('/'), route.device_id);
		let request = TransportRequest::new(Method::DELETE, url).with_token(route.token);
		let outcome = match self.gate.acquire().await {
			Ok(_slot) => self.transport.execute(request).await,
			Err(err) => Err(err),
		};

		match outcome.and_then(|reply| Ok(Envelope::from_value(reply)?)) {
			Ok(envelope) if envelope.is_success() => debug!(target = "stor.session", "session closed"),
			Ok(envelope) => warn!(target = "stor.session", code = envelope.code(), "logout rejected; ignoring"),
			Err(err) => warn!(target = "stor.session", error = %err, "logout failed; ignoring"),
		}

		self.session.write().clear_credentials();
	}

	/// Looks the login secret up, refreshing a stale reference once.
	async fn fetch_secret(&self) -> Result<Secret> {
		let reference = self.current_secret_ref().await?;
		match self.collaborators.secrets.get_secret(&reference).await {
			Err(Error::SecretNotFound { .. }) => {
				let Some(backend) = &self.collaborators.backend else {
					return Err(reference.not_found());
				};
				let fresh = backend.secret_ref().await?;
				info!(target = "stor.session", stale = %reference, fresh = %fresh, "secret not found; retrying with refreshed reference");
				*self.secret_ref.write() = Some(fresh.clone());
				self.collaborators.secrets.get_secret(&fresh).await
			}
			other => other,
		}
	}

	async fn current_secret_ref(&self) -> Result<SecretRef> {
		let cached = self.secret_ref.read().clone();
		if let Some(reference) = cached {
			return Ok(reference);
		}

		let Some(backend) = &self.collaborators.backend else {
			return Err(Error::Secret("no secret reference configured".to_string()));
		};
		let reference = backend.secret_ref().await?;
		*self.secret_ref.write() = Some(reference.clone());
		Ok(reference)
	}
}

impl std::fmt::Debug for SessionManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionManager")
			.field("session", &*self.session.read())
			.field("gate", &self.gate)
			.finish_non_exhaustive()
	}
}

/// Works out how the transport should verify the array certificate.
///
/// The backend descriptor, when present, decides whether verification is on and
/// which CA bundle to use; otherwise the configuration does.
pub async fn resolve_tls(config: &ClientConfig, collaborators: &Collaborators) -> Result<TlsSettings> {
	let (use_certificate, reference) = match &collaborators.backend {
		Some(backend) => (backend.use_certificate().await?, backend.certificate_ref().await?.or_else(|| config.certificate.clone())),
		None => (config.use_certificate, config.certificate.clone()),
	};

	if !use_certificate {
		return Ok(TlsSettings::insecure());
	}

	match (reference, &collaborators.certificates) {
		(Some(reference), Some(store)) => Ok(TlsSettings::with_ca_pem(store.get_certificate(&reference).await?)),
		(Some(reference), None) => Err(Error::Secret(format!("certificate {reference} is configured but no certificate store is available"))),
		(None, _) => Ok(TlsSettings::system_roots()),
	}
}

/// Zeroes the password in the login body once no request holds it any more.
fn scrub_password(body: Arc<Value>) {
	match Arc::try_unwrap(body) {
		Ok(mut body) => {
			if let Some(Value::String(password)) = body.get_mut("password") {
				password.zeroize();
			}
		}
		Err(_) => debug!(target = "stor.session", "login body still referenced; password left to its holder"),
	}
}
