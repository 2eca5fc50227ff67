//! Logical operation names mapped to URL path templates.
//!
//! Templates are relative to the session's device root, e.g. `/filesystem/{id}`,
//! and may carry a query string. Paths under `/api/v2/` are addressed at the bare
//! origin of the base URL instead (see [`compose_url`]).
//!
//! A registry is built once, validated while it is built, and then shared
//! read-only:
//!
//! ```ignore
//! let registry = EndpointRegistry::builder()
//!     .register("filesystem.get", "/filesystem/{id}")
//!     .register("lun.count", "/lun/count")
//!     .build()?;
//! let path = registry.resolve("filesystem.get", &args([("id", "12")]))?;
//! ```

use std::collections::{BTreeMap, HashMap};

use stor_runtime::{Error, Result};
use url::Url;

/// Arguments substituted into a template, keyed by placeholder name.
pub type Args = BTreeMap<String, String>;

/// Prefix of the path family addressed at the bare origin of the base URL.
pub const V2_PREFIX: &str = "/api/v2/";

/// Builds [`Args`] from key/value pairs.
pub fn args<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Args
where
	K: Into<String>,
	V: Into<String>,
{
	pairs.into_iter().map(|(key, value)| (key.into(), value.into())).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
	Literal(String),
	Placeholder(String),
}

/// A parsed URL pattern with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTemplate {
	raw: String,
	segments: Vec<Segment>,
}

impl EndpointTemplate {
	/// Parses `template`, rejecting unbalanced braces and placeholder names that are
	/// not identifiers.
	pub fn parse(template: &str) -> Result<Self> {
		let invalid = |reason: String| Error::InvalidTemplate {
			template: template.to_string(),
			reason,
		};

		let mut segments = Vec::new();
		let mut literal = String::new();
		let mut chars = template.char_indices();

		while let Some((offset, ch)) = chars.next() {
			match ch {
				'{' => {
					let mut name = String::new();
					let mut closed = false;
					for (_, inner) in chars.by_ref() {
						match inner {
							'}' => {
								closed = true;
								break;
							}
							'{' => return Err(invalid(format!("nested '{{' in placeholder starting at {offset}"))),
							other => name.push(other),
						}
					}
					if !closed {
						return Err(invalid(format!("unclosed '{{' at {offset}")));
					}
					if !is_identifier(&name) {
						return Err(invalid(format!("placeholder name '{name}' is not an identifier")));
					}
					if !literal.is_empty() {
						segments.push(Segment::Literal(std::mem::take(&mut literal)));
					}
					segments.push(Segment::Placeholder(name));
				}
				'}' => return Err(invalid(format!("unmatched '}}' at {offset}"))),
				other => literal.push(other),
			}
		}
		if !literal.is_empty() {
			segments.push(Segment::Literal(literal));
		}

		Ok(Self {
			raw: template.to_string(),
			segments,
		})
	}

	pub fn as_str(&self) -> &str {
		&self.raw
	}

	/// Placeholder names in order of appearance.
	pub fn placeholders(&self) -> impl Iterator<Item = &str> {
		self.segments.iter().filter_map(|segment| match segment {
			Segment::Placeholder(name) => Some(name.as_str()),
			Segment::Literal(_) => None,
		})
	}

	/// Substitutes every placeholder from `args`. Values are inserted verbatim.
	pub fn render(&self, operation: &str, args: &Args) -> Result<String> {
		let mut rendered = String::with_capacity(self.raw.len());
		for segment in &self.segments {
			match segment {
				Segment::Literal(text) => rendered.push_str(text),
				Segment::Placeholder(name) => {
					let value = args.get(name).ok_or_else(|| Error::MissingArgument {
						operation: operation.to_string(),
						argument: name.clone(),
					})?;
					rendered.push_str(value);
				}
			}
		}
		Ok(rendered)
	}
}

fn is_identifier(name: &str) -> bool {
	let mut chars = name.chars();
	match chars.next() {
		Some(first) if first.is_ascii_alphabetic() || first == '_' => chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_'),
		_ => false,
	}
}

/// Immutable map from operation name to template.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
	templates: HashMap<String, EndpointTemplate>,
}

impl EndpointRegistry {
	pub fn builder() -> EndpointRegistryBuilder {
		EndpointRegistryBuilder::default()
	}

	/// Registry with the operations of the standard management API.
	pub fn standard() -> Result<Self> {
		STANDARD_OPERATIONS
			.iter()
			.fold(Self::builder(), |builder, (name, template)| builder.register(*name, *template))
			.build()
	}

	/// Resolves `operation` into a path.
	pub fn resolve(&self, operation: &str, args: &Args) -> Result<String> {
		self.template(operation)?.render(operation, args)
	}

	pub fn template(&self, operation: &str) -> Result<&EndpointTemplate> {
		self.templates.get(operation).ok_or_else(|| Error::UnknownOperation(operation.to_string()))
	}

	pub fn contains(&self, operation: &str) -> bool {
		self.templates.contains_key(operation)
	}

	/// Registered operations sorted by name.
	pub fn operations(&self) -> Vec<(&str, &EndpointTemplate)> {
		let mut operations: Vec<_> = self.templates.iter().map(|(name, template)| (name.as_str(), template)).collect();
		operations.sort_by_key(|(name, _)| *name);
		operations
	}

	pub fn len(&self) -> usize {
		self.templates.len()
	}

	pub fn is_empty(&self) -> bool {
		self.templates.is_empty()
	}
}

/// Collects registrations; the first invalid one fails [`build`](Self::build).
#[derive(Debug, Default)]
pub struct EndpointRegistryBuilder {
	templates: HashMap<String, EndpointTemplate>,
	error: Option<Error>,
}

impl EndpointRegistryBuilder {
	pub fn register(mut self, operation: impl Into<String>, template: &str) -> Self {
		if self.error.is_some() {
			return self;
		}

		let operation = operation.into();
		if self.templates.contains_key(&operation) {
			self.error = Some(Error::InvalidTemplate {
				template: template.to_string(),
				reason: format!("operation '{operation}' is already registered"),
			});
			return self;
		}

		match EndpointTemplate::parse(template) {
			Ok(parsed) => {
				self.templates.insert(operation, parsed);
			}
			Err(err) => self.error = Some(err),
		}
		self
	}

	pub fn build(self) -> Result<EndpointRegistry> {
		match self.error {
			Some(err) => Err(err),
			None => Ok(EndpointRegistry { templates: self.templates }),
		}
	}
}

/// Joins a resolved path onto the session's base URL.
///
/// Ordinary paths go to `{base}/{device_id}{path}`; paths under [`V2_PREFIX`] go to
/// the origin of `base` with the path appended unchanged.
pub fn compose_url(base: &str, device_id: &str, path: &str) -> Result<String> {
	if path.starts_with(V2_PREFIX) {
		let parsed = Url::parse(base).map_err(|err| Error::Transport(format!("invalid base URL '{base}': {err}")))?;
		return Ok(format!("{}{path}", parsed.origin().ascii_serialization()));
	}
	Ok(format!("{}/{device_id}{path}", base.trim_end_matches('/')))
}

/// Appends `key=value` pairs to a path that may already carry a query string.
pub fn append_query(path: &str, query: &[(String, String)]) -> String {
	let mut path = path.to_string();
	for (key, value) in query {
		path.push(if path.contains('?') { '&' } else { '?' });
		path.push_str(key);
		path.push('=');
		path.push_str(value);
	}
	path
}

const STANDARD_OPERATIONS: &[(&str, &str)] = &[
	("session.current", "/sessions"),
	("system.info", "/system/"),
	("filesystem.get", "/filesystem/{id}"),
	("filesystem.get_by_name", "/filesystem?filter=NAME::{name}"),
	("filesystem.list", "/filesystem"),
	("filesystem.count", "/filesystem/count"),
	("filesystem.create", "/filesystem"),
	("filesystem.update", "/filesystem/{id}"),
	("filesystem.delete", "/filesystem/{id}"),
	("nfs_share.get_by_path", "/NFSHARE?filter=SHAREPATH::{path}"),
	("nfs_share.create", "/NFSHARE"),
	("nfs_share.delete", "/NFSHARE/{id}"),
	("lun.get", "/lun/{id}"),
	("lun.get_by_name", "/lun?filter=NAME::{name}"),
	("lun.list", "/lun"),
	("lun.count", "/lun/count"),
	("lun.create", "/lun"),
	("lun.expand", "/lun/expand"),
	("lun.delete", "/lun/{id}"),
	("storagepool.get_by_name", "/storagepool?filter=NAME::{name}"),
	("storagepool.list", "/storagepool"),
	("vstore.list", "/vstore"),
	("vstore.count", "/vstore/count"),
	("label.associate", "/api/v2/pv_label"),
	("label.disassociate", "/api/v2/pv_label"),
	("performance.query", "/performance?object_type={object_type}&indicators={indicators}"),
];
