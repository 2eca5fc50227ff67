//! Maps a validated envelope to the outcome the client acts on.

use stor_protocol::{Envelope, Payload, codes};
use stor_runtime::{Error, Result, RetryPolicy};

/// What the client should do with a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
	/// Code zero, or a code the call declared as "already in the desired state".
	Success { code: i64, payload: Payload },
	/// The session token was rejected; log in again and redrive.
	NeedsRelogin { code: i64 },
	/// Transient failure listed in the retry policy.
	Retryable { code: i64, description: String },
	/// Any other failure.
	Fatal { code: i64, description: String },
}

impl Verdict {
	pub fn code(&self) -> i64 {
		match self {
			Verdict::Success { code, .. } | Verdict::NeedsRelogin { code } | Verdict::Retryable { code, .. } | Verdict::Fatal { code, .. } => *code,
		}
	}

	/// Converts into the caller-facing result for `operation`.
	pub fn into_result(self, operation: &str) -> Result<Payload> {
		match self {
			Verdict::Success { payload, .. } => Ok(payload),
			Verdict::NeedsRelogin { code } => Err(Error::NotAuthenticated { code }),
			Verdict::Retryable { code, description } | Verdict::Fatal { code, description } => Err(Error::Api {
				operation: operation.to_string(),
				code,
				description,
			}),
		}
	}
}

/// Classifies `envelope`. `idempotent_codes` are remapped to success before any
/// other rule applies.
pub fn classify(envelope: Envelope, policy: &RetryPolicy, idempotent_codes: &[i64]) -> Verdict {
	let Envelope { status, data } = envelope;
	let code = status.code;

	if status.is_success() || idempotent_codes.contains(&code) {
		return Verdict::Success { code, payload: data };
	}
	if code == codes::NO_AUTHENTICATION {
		return Verdict::NeedsRelogin { code };
	}

	let description = status.describe();
	if policy.is_retryable(code) {
		Verdict::Retryable { code, description }
	} else {
		Verdict::Fatal { code, description }
	}
}
