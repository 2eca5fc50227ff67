//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use stor_protocol::codes;
use stor_protocol::login::LOCAL_SCOPE;
use stor_runtime::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, RetryPolicy};

use crate::secrets::SecretRef;

pub const DEFAULT_MAX_CONCURRENCY: usize = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Everything needed to open sessions against one array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
	/// Candidate REST roots, tried in order at login.
	pub base_urls: Vec<String>,
	pub username: String,
	#[serde(default = "default_scope")]
	pub scope: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub vstore_name: Option<String>,
	#[serde(default = "default_max_concurrency")]
	pub max_concurrency: usize,
	#[serde(default = "default_request_timeout_secs")]
	pub request_timeout_secs: u64,
	#[serde(default)]
	pub retry: RetryConfig,
	/// Login secret; the backend descriptor's reference is used when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub secret: Option<SecretRef>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub certificate: Option<SecretRef>,
	#[serde(default)]
	pub use_certificate: bool,
}

impl ClientConfig {
	pub fn new(base_urls: impl IntoIterator<Item = impl Into<String>>, username: impl Into<String>) -> Self {
		Self {
			base_urls: base_urls.into_iter().map(Into::into).collect(),
			username: username.into(),
			scope: default_scope(),
			vstore_name: None,
			max_concurrency: DEFAULT_MAX_CONCURRENCY,
			request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
			retry: RetryConfig::default(),
			secret: None,
			certificate: None,
			use_certificate: false,
		}
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}

	pub fn with_secret(mut self, secret: SecretRef) -> Self {
		self.secret = Some(secret);
		self
	}
}

/// Busy-array retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
	pub max_attempts: u32,
	pub delay_ms: u64,
	pub retryable_codes: Vec<i64>,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: DEFAULT_MAX_ATTEMPTS,
			delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
			retryable_codes: codes::SYSTEM_BUSY_CODES.to_vec(),
		}
	}
}

impl RetryConfig {
	pub fn policy(&self) -> RetryPolicy {
		RetryPolicy::new(self.retryable_codes.clone(), self.max_attempts, Duration::from_millis(self.delay_ms))
	}
}

fn default_scope() -> String {
	LOCAL_SCOPE.to_string()
}

fn default_max_concurrency() -> usize {
	DEFAULT_MAX_CONCURRENCY
}

fn default_request_timeout_secs() -> u64 {
	DEFAULT_REQUEST_TIMEOUT_SECS
}
