//! Session bootstrap message types.
//!
//! A session is opened with `POST {base}/xxxxx/sessions` carrying a
//! [`LoginRequest`]. The envelope `data` of a successful reply is parsed into a
//! [`LoginResponse`] with [`LoginResponse::from_object`], which checks the
//! fields later calls depend on.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::envelope::{Object, integer_value};

/// Device placeholder used in the login path before the array assigns a device id.
pub const DEVICELESS_SEGMENT: &str = "xxxxx";

/// Scope value for local array users.
pub const LOCAL_SCOPE: &str = "0";

/// Request body for opening a session.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
	pub username: &'a str,
	pub password: &'a str,
	pub scope: &'a str,
}

/// State of the account that logged in, from the `accountstate` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
	Normal,
	Locked,
	MustChangeAtNextLogin,
	PasswordExpiringSoon,
	PasswordExpired,
	NeverExpires,
	Other(i64),
}

impl AccountState {
	pub fn from_code(code: i64) -> Self {
		match code {
			1 => AccountState::Normal,
			2 => AccountState::Locked,
			3 => AccountState::MustChangeAtNextLogin,
			4 => AccountState::PasswordExpiringSoon,
			5 => AccountState::PasswordExpired,
			6 => AccountState::NeverExpires,
			other => AccountState::Other(other),
		}
	}

	pub fn code(self) -> i64 {
		match self {
			AccountState::Normal => 1,
			AccountState::Locked => 2,
			AccountState::MustChangeAtNextLogin => 3,
			AccountState::PasswordExpiringSoon => 4,
			AccountState::PasswordExpired => 5,
			AccountState::NeverExpires => 6,
			AccountState::Other(code) => code,
		}
	}

	/// Whether a session opened by an account in this state may be used.
	pub fn is_usable(self) -> bool {
		matches!(
			self,
			AccountState::Normal | AccountState::PasswordExpiringSoon | AccountState::MustChangeAtNextLogin | AccountState::NeverExpires
		)
	}
}

/// Problems with the `data` object of a successful login reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginResponseError {
	#[error("login response has no data object")]
	MissingData,

	#[error("login response is missing `{0}`")]
	MissingField(&'static str),

	#[error("login response field `{0}` is not a string")]
	NotAString(&'static str),
}

/// Parsed login reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
	pub device_id: String,
	pub token: String,
	pub vstore_name: Option<String>,
	pub account_state: Option<AccountState>,
}

impl LoginResponse {
	/// Extracts the session fields. `deviceid` and `iBaseToken` must both be present
	/// as non-empty strings; `vstoreName` and `accountstate` are optional here and
	/// the account state is policed by the session layer.
	pub fn from_object(data: &Object) -> Result<Self, LoginResponseError> {
		let device_id = required_string(data, "deviceid")?;
		let token = required_string(data, "iBaseToken")?;
		let vstore_name = data.get("vstoreName").and_then(Value::as_str).filter(|name| !name.is_empty()).map(str::to_string);
		let account_state = data.get("accountstate").and_then(integer_value).map(AccountState::from_code);

		Ok(Self {
			device_id,
			token,
			vstore_name,
			account_state,
		})
	}
}

fn required_string(data: &Object, field: &'static str) -> Result<String, LoginResponseError> {
	match data.get(field) {
		None | Some(Value::Null) => Err(LoginResponseError::MissingField(field)),
		Some(Value::String(text)) if text.is_empty() => Err(LoginResponseError::MissingField(field)),
		Some(Value::String(text)) => Ok(text.clone()),
		Some(_) => Err(LoginResponseError::NotAString(field)),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn object(value: Value) -> Object {
		value.as_object().cloned().unwrap()
	}

	#[test]
	fn login_request_serializes_expected_fields() {
		let request = LoginRequest {
			username: "admin",
			password: "secret",
			scope: LOCAL_SCOPE,
		};
		let json = serde_json::to_value(&request).unwrap();
		assert_eq!(json, json!({"username": "admin", "password": "secret", "scope": "0"}));
	}

	#[test]
	fn parses_complete_login_reply() {
		let data = object(json!({
			"deviceid": "2102351234",
			"iBaseToken": "ABCDEF",
			"vstoreName": "tenant-a",
			"accountstate": 1
		}));

		let response = LoginResponse::from_object(&data).unwrap();
		assert_eq!(response.device_id, "2102351234");
		assert_eq!(response.token, "ABCDEF");
		assert_eq!(response.vstore_name.as_deref(), Some("tenant-a"));
		assert_eq!(response.account_state, Some(AccountState::Normal));
	}

	#[test]
	fn missing_token_is_rejected() {
		let data = object(json!({"deviceid": "1", "accountstate": 1}));
		assert_eq!(LoginResponse::from_object(&data).unwrap_err(), LoginResponseError::MissingField("iBaseToken"));
	}

	#[test]
	fn non_string_token_is_rejected() {
		let data = object(json!({"deviceid": "1", "iBaseToken": 42}));
		assert_eq!(LoginResponse::from_object(&data).unwrap_err(), LoginResponseError::NotAString("iBaseToken"));
	}

	#[test]
	fn account_state_may_be_a_numeric_string() {
		let data = object(json!({"deviceid": "1", "iBaseToken": "t", "accountstate": "4", "vstoreName": ""}));
		let response = LoginResponse::from_object(&data).unwrap();
		assert_eq!(response.account_state, Some(AccountState::PasswordExpiringSoon));
		assert_eq!(response.vstore_name, None);
	}

	#[test]
	fn usable_account_states() {
		for code in [1, 3, 4, 6] {
			assert!(AccountState::from_code(code).is_usable(), "state {code} should be usable");
		}
		for code in [2, 5, 0, 99] {
			assert!(!AccountState::from_code(code).is_usable(), "state {code} should not be usable");
		}
		assert_eq!(AccountState::from_code(99).code(), 99);
	}
}
