//! Log rendering for request and response bodies.

use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde_json::Value;

/// Bodies longer than this are logged compressed.
pub const SUMMARY_THRESHOLD: usize = 4096;

const MASK: &str = "******";

/// Renders a response body for logging. Bodies above [`SUMMARY_THRESHOLD`] are
/// gzip-compressed and base64-encoded, prefixed with their original length.
pub fn summarize(bytes: &[u8]) -> String {
	if bytes.len() <= SUMMARY_THRESHOLD {
		return String::from_utf8_lossy(bytes).into_owned();
	}

	match compress(bytes) {
		Ok(encoded) => format!("<{} bytes, gzip+base64> {encoded}", bytes.len()),
		Err(_) => format!("<{} bytes>", bytes.len()),
	}
}

fn compress(bytes: &[u8]) -> std::io::Result<String> {
	let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
	encoder.write_all(bytes)?;
	Ok(STANDARD.encode(encoder.finish()?))
}

/// Renders a request body for logging with every `password` field masked.
pub fn redacted(body: Option<&Value>) -> String {
	match body {
		None => "<none>".to_string(),
		Some(value) => serde_json::to_string(&Redacted(value)).unwrap_or_else(|err| format!("<unrenderable body: {err}>")),
	}
}

/// Serializes the wrapped value with secrets replaced, without copying it.
struct Redacted<'a>(&'a Value);

impl Serialize for Redacted<'_> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self.0 {
			Value::Object(object) => {
				let mut map = serializer.serialize_map(Some(object.len()))?;
				for (key, field) in object {
					if key.eq_ignore_ascii_case("password") {
						map.serialize_entry(key, MASK)?;
					} else {
						map.serialize_entry(key, &Redacted(field))?;
					}
				}
				map.end()
			}
			Value::Array(items) => {
				let mut seq = serializer.serialize_seq(Some(items.len()))?;
				for item in items {
					seq.serialize_element(&Redacted(item))?;
				}
				seq.end()
			}
			other => other.serialize(serializer),
		}
	}
}
