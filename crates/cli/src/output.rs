//! Command output envelope.
//!
//! Every command prints one JSON document on stdout:
//!
//! ```json
//! { "ok": true, "command": "count", "data": { "count": 5 }, "timings": { "durationMs": 41 } }
//! ```
//!
//! Failures set `ok` to false and carry an [`CommandError`] instead of `data`. A
//! one-line human summary also goes to stderr.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,
}

/// Error information for failed commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
	/// Array status code, when the array produced one.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub array_code: Option<i64>,
}

/// Standardized error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// No candidate endpoint answered
	Unreachable,
	/// Login rejected, account unusable, or session refused
	AuthError,
	/// The array answered with a failure code
	ApiError,
	/// Certificate or trust configuration problem
	TlsError,
	/// Credential lookup failed
	SecretError,
	/// Unknown operation, missing argument, or bad flag value
	InvalidInput,
	/// Config file missing or malformed
	ConfigError,
	IoError,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			ErrorCode::Unreachable => "UNREACHABLE",
			ErrorCode::AuthError => "AUTH_ERROR",
			ErrorCode::ApiError => "API_ERROR",
			ErrorCode::TlsError => "TLS_ERROR",
			ErrorCode::SecretError => "SECRET_ERROR",
			ErrorCode::InvalidInput => "INVALID_INPUT",
			ErrorCode::ConfigError => "CONFIG_ERROR",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		f.write_str(name)
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Timings {
			duration_ms: duration.as_millis() as u64,
		}
	}
}

/// Builder for [`CommandResult`].
pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	duration: Option<Duration>,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			duration: None,
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, error: CommandError) -> Self {
		self.error = Some(error);
		self
	}

	pub fn duration(mut self, duration: Duration) -> Self {
		self.duration = Some(duration);
		self
	}

	pub fn build(self) -> CommandResult<T> {
		CommandResult {
			ok: self.error.is_none(),
			command: self.command,
			data: self.data,
			error: self.error,
			timings: self.duration.map(Timings::from),
		}
	}
}

pub fn to_json<T: Serialize>(result: &CommandResult<T>) -> String {
	serde_json::to_string_pretty(result).unwrap_or_else(|err| format!(r#"{{"ok":false,"error":{{"code":"INTERNAL_ERROR","message":"{err}"}}}}"#))
}

pub fn print_result<T: Serialize>(result: &CommandResult<T>) {
	println!("{}", to_json(result));
}

pub fn print_error_stderr(error: &CommandError) {
	match error.array_code {
		Some(code) => eprintln!("error[{}]: {} (array code {code})", error.code, error.message),
		None => eprintln!("error[{}]: {}", error.code, error.message),
	}
}
