use std::path::PathBuf;

use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("no config file at {}; pass --config or create it", path.display())]
	ConfigNotFound { path: PathBuf },

	#[error("invalid config: {0}")]
	Config(String),

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error(transparent)]
	Client(#[from] stor::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	pub fn to_command_error(&self) -> CommandError {
		let (code, array_code) = match self {
			CliError::ConfigNotFound { .. } | CliError::Config(_) => (ErrorCode::ConfigError, None),
			CliError::InvalidInput(_) => (ErrorCode::InvalidInput, None),
			CliError::Client(err) => (client_error_code(err), err.code()),
			CliError::Io(_) => (ErrorCode::IoError, None),
			CliError::Json(_) => (ErrorCode::InvalidInput, None),
			CliError::Anyhow(_) => (ErrorCode::InternalError, None),
		};

		CommandError {
			code,
			message: self.to_string(),
			array_code,
		}
	}
}

fn client_error_code(err: &stor::Error) -> ErrorCode {
	use stor::Error;

	match err {
		Error::AllEndpointsUnreachable { .. } | Error::Transport(_) => ErrorCode::Unreachable,
		Error::Certificate(_) | Error::TlsConfig(_) => ErrorCode::TlsError,
		Error::LoginRejected { .. } | Error::AccountStateInvalid { .. } | Error::NotAuthenticated { .. } | Error::InvalidLoginResponse(_) => {
			ErrorCode::AuthError
		}
		Error::Api { .. } | Error::CountNotFound(_) | Error::UnexpectedPayload { .. } | Error::MalformedEnvelope(_) => ErrorCode::ApiError,
		Error::UnknownOperation(_) | Error::MissingArgument { .. } | Error::InvalidTemplate { .. } => ErrorCode::InvalidInput,
		Error::SecretNotFound { .. } | Error::Secret(_) => ErrorCode::SecretError,
		Error::GateClosed | Error::Json(_) => ErrorCode::InternalError,
	}
}
