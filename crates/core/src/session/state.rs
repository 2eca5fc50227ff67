use std::fmt;

/// Lifecycle of the client's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
	#[default]
	Unauthenticated,
	Authenticating,
	Active,
	ReloggingIn,
	LoggedOut,
}

impl SessionState {
	pub fn as_str(self) -> &'static str {
		match self {
			SessionState::Unauthenticated => "unauthenticated",
			SessionState::Authenticating => "authenticating",
			SessionState::Active => "active",
			SessionState::ReloggingIn => "relogging_in",
			SessionState::LoggedOut => "logged_out",
		}
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The one live session of a client instance.
#[derive(Clone, Default)]
pub struct ClientSession {
	pub(crate) state: SessionState,
	pub(crate) candidates: Vec<String>,
	pub(crate) base_url: Option<String>,
	pub(crate) device_id: Option<String>,
	pub(crate) token: Option<String>,
	pub(crate) vstore_name: Option<String>,
	pub(crate) username: String,
}

impl ClientSession {
	pub(crate) fn new(candidates: Vec<String>, username: String) -> Self {
		Self {
			candidates,
			username,
			..Self::default()
		}
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	pub fn candidates(&self) -> &[String] {
		&self.candidates
	}

	pub fn base_url(&self) -> Option<&str> {
		self.base_url.as_deref()
	}

	pub fn device_id(&self) -> Option<&str> {
		self.device_id.as_deref()
	}

	pub fn vstore_name(&self) -> Option<&str> {
		self.vstore_name.as_deref()
	}

	pub fn username(&self) -> &str {
		&self.username
	}

	pub fn has_token(&self) -> bool {
		self.token.is_some()
	}

	pub(crate) fn snapshot(&self) -> TokenSnapshot {
		TokenSnapshot(self.token.clone())
	}

	pub(crate) fn route(&self) -> Option<Route> {
		match (&self.base_url, &self.device_id, &self.token) {
			(Some(base_url), Some(device_id), Some(token)) => Some(Route {
				base_url: base_url.clone(),
				device_id: device_id.clone(),
				token: token.clone(),
			}),
			_ => None,
		}
	}

	/// Drops the device binding and token; the adopted base URL is kept for logs.
	pub(crate) fn clear_credentials(&mut self) {
		self.device_id = None;
		self.token = None;
	}
}

impl fmt::Debug for ClientSession {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ClientSession")
			.field("state", &self.state)
			.field("candidates", &self.candidates)
			.field("base_url", &self.base_url)
			.field("device_id", &self.device_id)
			.field("token", &self.token.as_ref().map(|_| "******"))
			.field("vstore_name", &self.vstore_name)
			.field("username", &self.username)
			.finish()
	}
}

/// Token value a caller observed when it decided a relogin was needed.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct TokenSnapshot(Option<String>);

impl TokenSnapshot {
	/// Snapshot of a client that has no session yet.
	pub fn empty() -> Self {
		Self(None)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_none()
	}
}

impl fmt::Debug for TokenSnapshot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.0 {
			Some(_) => f.write_str("TokenSnapshot(******)"),
			None => f.write_str("TokenSnapshot(<none>)"),
		}
	}
}

/// Everything a request needs from the session, read in one go.
#[derive(Clone)]
pub struct Route {
	pub base_url: String,
	pub device_id: String,
	pub token: String,
}

impl Route {
	pub fn snapshot(&self) -> TokenSnapshot {
		TokenSnapshot(Some(self.token.clone()))
	}
}

impl fmt::Debug for Route {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Route")
			.field("base_url", &self.base_url)
			.field("device_id", &self.device_id)
			.finish_non_exhaustive()
	}
}
