//! Error types for the storage array client.

use stor_protocol::{EnvelopeError, LoginResponseError};
use thiserror::Error;

use crate::retry::RetryPolicy;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the array.
#[derive(Debug, Error)]
pub enum Error {
	/// Network or I/O failure, request construction failure, or a non-JSON body.
	#[error("Transport error: {0}")]
	Transport(String),

	/// The peer certificate could not be verified.
	#[error("Certificate error: {0}")]
	Certificate(String),

	/// TLS trust material could not be turned into a client configuration.
	#[error("TLS configuration error: {0}")]
	TlsConfig(String),

	/// The response body is not a valid envelope.
	#[error("Malformed response envelope: {0}")]
	MalformedEnvelope(#[from] EnvelopeError),

	/// The logical operation was never registered.
	#[error("Unknown operation: {0}")]
	UnknownOperation(String),

	/// The endpoint template references a placeholder the caller did not supply.
	#[error("Operation '{operation}' requires argument '{argument}'")]
	MissingArgument { operation: String, argument: String },

	/// An endpoint template could not be parsed at registration.
	#[error("Invalid endpoint template '{template}': {reason}")]
	InvalidTemplate { template: String, reason: String },

	/// Every candidate base URL failed at transport level during login.
	#[error("All {attempted} array endpoints are unreachable; last error: {last_error}")]
	AllEndpointsUnreachable { attempted: usize, last_error: String },

	/// The login reply does not carry the session fields.
	#[error("Invalid login response: {0}")]
	InvalidLoginResponse(#[from] LoginResponseError),

	/// The account that logged in is not in a usable state.
	#[error("Account state {} is not usable", state.map(|s| s.to_string()).unwrap_or_else(|| "<missing>".to_string()))]
	AccountStateInvalid { state: Option<i64> },

	/// The array refused the login.
	#[error("Login rejected by {url}: {description} (code {code})")]
	LoginRejected { url: String, code: i64, description: String },

	/// The session token was not accepted.
	#[error("Not authenticated (code {code})")]
	NotAuthenticated { code: i64 },

	/// The array returned a failure code for the operation.
	#[error("{operation} failed: {description} (code {code})")]
	Api { operation: String, code: i64, description: String },

	/// A count query reply had no `COUNT` field.
	#[error("Count not found in response to {0}")]
	CountNotFound(String),

	/// The reply payload does not have the expected shape.
	#[error("Unexpected payload for {operation}: {reason}")]
	UnexpectedPayload { operation: String, reason: String },

	/// The secret collaborator has no secret under this reference.
	#[error("Secret {namespace}/{name} not found")]
	SecretNotFound { namespace: String, name: String },

	/// Any other secret or certificate collaborator failure.
	#[error("Secret error: {0}")]
	Secret(String),

	/// The admission gate was closed.
	#[error("Admission gate closed")]
	GateClosed,

	/// JSON serialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns the array status code carried by this error, if any.
	pub fn code(&self) -> Option<i64> {
		match self {
			Error::Api { code, .. } | Error::LoginRejected { code, .. } | Error::NotAuthenticated { code } => Some(*code),
			_ => None,
		}
	}

	/// Returns true for network-level failures (including certificate failures).
	pub fn is_transport(&self) -> bool {
		matches!(self, Error::Transport(_) | Error::Certificate(_))
	}

	/// Returns true if the peer certificate was rejected.
	pub fn is_certificate(&self) -> bool {
		matches!(self, Error::Certificate(_))
	}

	/// Returns true if the carried code is retried by `policy`.
	pub fn is_retryable_in(&self, policy: &RetryPolicy) -> bool {
		self.code().is_some_and(|code| policy.is_retryable(code))
	}

	/// Returns true if the array asked for a new login.
	pub fn needs_relogin(&self) -> bool {
		matches!(self, Error::NotAuthenticated { .. })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn code_is_exposed_for_classified_failures() {
		let err = Error::Api {
			operation: "filesystem.create".into(),
			code: 1077949006,
			description: "busy".into(),
		};
		assert_eq!(err.code(), Some(1077949006));
		assert_eq!(err.to_string(), "filesystem.create failed: busy (code 1077949006)");
		assert_eq!(Error::Transport("refused".into()).code(), None);
	}

	#[test]
	fn predicates() {
		assert!(Error::Certificate("unknown issuer".into()).is_transport());
		assert!(Error::Certificate("unknown issuer".into()).is_certificate());
		assert!(!Error::Transport("reset".into()).is_certificate());
		assert!(Error::NotAuthenticated { code: -401 }.needs_relogin());
		assert!(!Error::GateClosed.needs_relogin());

		let busy = Error::Api {
			operation: "lun.list".into(),
			code: stor_protocol::codes::SYSTEM_BUSY,
			description: "busy".into(),
		};
		assert!(busy.is_retryable_in(&RetryPolicy::system_busy()));
		assert!(!busy.is_retryable_in(&RetryPolicy::single_attempt()));
	}

	#[test]
	fn account_state_message_handles_missing_state() {
		assert_eq!(Error::AccountStateInvalid { state: None }.to_string(), "Account state <missing> is not usable");
		assert_eq!(Error::AccountStateInvalid { state: Some(2) }.to_string(), "Account state 2 is not usable");
	}
}
