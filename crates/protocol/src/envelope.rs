//! Response envelope returned by every management API call.
//!
//! The array wraps every response body in the same shape:
//!
//! ```text
//! { "error": { "code": 0, "description": "0" }, "data": { ... } | [ { ... } ] }
//! ```
//!
//! [`Envelope::from_value`] validates that shape eagerly so call sites never inspect the
//! raw JSON map: the status code is mandatory and `data` is normalised into a
//! [`Payload`] sum type.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::codes;

/// A single JSON object from the `data` field.
pub type Object = Map<String, Value>;

/// Reasons a decoded body is not a usable envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
	#[error("response body is not a JSON object")]
	NotAnObject,

	#[error("response has no status object")]
	MissingStatus,

	#[error("response status has no code")]
	MissingCode,

	#[error("response status code is not an integer: {0}")]
	InvalidCode(String),

	#[error("response data must be an object or a list, got {0}")]
	InvalidData(&'static str),

	#[error("response data list has a non-object element at index {0}")]
	InvalidListItem(usize),
}

/// Status object carried under the `error` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
	pub code: i64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

impl Status {
	/// Returns true for the sole success sentinel.
	pub fn is_success(&self) -> bool {
		self.code == codes::SUCCESS
	}

	/// Human readable description, falling back to the code.
	pub fn describe(&self) -> String {
		match self.description.as_deref() {
			Some(text) if !text.is_empty() => text.to_string(),
			_ => format!("code {}", self.code),
		}
	}
}

/// Normalised `data` field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
	Object(Object),
	List(Vec<Object>),
	#[default]
	Absent,
}

impl Payload {
	fn from_data(data: Option<Value>) -> Result<Self, EnvelopeError> {
		match data {
			None | Some(Value::Null) => Ok(Payload::Absent),
			Some(Value::Object(object)) => Ok(Payload::Object(object)),
			Some(Value::Array(items)) => items
				.into_iter()
				.enumerate()
				.map(|(index, item)| match item {
					Value::Object(object) => Ok(object),
					_ => Err(EnvelopeError::InvalidListItem(index)),
				})
				.collect::<Result<Vec<_>, _>>()
				.map(Payload::List),
			Some(Value::Bool(_)) => Err(EnvelopeError::InvalidData("a boolean")),
			Some(Value::Number(_)) => Err(EnvelopeError::InvalidData("a number")),
			Some(Value::String(_)) => Err(EnvelopeError::InvalidData("a string")),
		}
	}

	pub fn is_absent(&self) -> bool {
		matches!(self, Payload::Absent)
	}

	pub fn as_object(&self) -> Option<&Object> {
		match self {
			Payload::Object(object) => Some(object),
			_ => None,
		}
	}

	pub fn into_object(self) -> Option<Object> {
		match self {
			Payload::Object(object) => Some(object),
			_ => None,
		}
	}

	/// Flattens the payload into rows. An absent payload is an empty result and a
	/// single object is a one-row result.
	pub fn into_list(self) -> Vec<Object> {
		match self {
			Payload::Object(object) => vec![object],
			Payload::List(items) => items,
			Payload::Absent => Vec::new(),
		}
	}

	/// Converts back into plain JSON (`null` when absent).
	pub fn to_value(&self) -> Value {
		match self {
			Payload::Object(object) => Value::Object(object.clone()),
			Payload::List(items) => Value::Array(items.iter().cloned().map(Value::Object).collect()),
			Payload::Absent => Value::Null,
		}
	}
}

/// A validated response envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
	pub status: Status,
	pub data: Payload,
}

impl Envelope {
	/// Validates a decoded JSON body.
	pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
		let Value::Object(mut body) = value else {
			return Err(EnvelopeError::NotAnObject);
		};

		let status = match body.remove("error") {
			Some(Value::Object(status)) => parse_status(&status)?,
			_ => return Err(EnvelopeError::MissingStatus),
		};
		let data = Payload::from_data(body.remove("data"))?;

		Ok(Self { status, data })
	}

	pub fn code(&self) -> i64 {
		self.status.code
	}

	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}
}

fn parse_status(status: &Object) -> Result<Status, EnvelopeError> {
	let code = match status.get("code") {
		None | Some(Value::Null) => return Err(EnvelopeError::MissingCode),
		Some(raw) => integer_value(raw).ok_or_else(|| EnvelopeError::InvalidCode(raw.to_string()))?,
	};
	let description = status.get("description").and_then(Value::as_str).map(str::to_string);
	Ok(Status { code, description })
}

/// Reads an integer that the array may encode either as a JSON number or as a
/// decimal string (`"COUNT": "12"`).
pub fn integer_value(value: &Value) -> Option<i64> {
	match value {
		Value::Number(number) => number.as_i64(),
		Value::String(text) => text.trim().parse().ok(),
		_ => None,
	}
}

/// Looks up `key` in `object` and reads it with [`integer_value`].
pub fn integer_field(object: &Object, key: &str) -> Option<i64> {
	object.get(key).and_then(integer_value)
}
