//! Credential sources for the command line.
//!
//! Secrets come from a JSON file keyed by `namespace/name`:
//!
//! ```json
//! { "storage/array-admin": { "password": "...", "authMode": "1" } }
//! ```
//!
//! When no entry matches, the password in `STOR_PASSWORD` is used for any reference.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use stor::{CertificateStore, Error, Secret, SecretFuture, SecretRef, SecretStore};
use zeroize::Zeroize;

use crate::error::Result;

pub const PASSWORD_ENV: &str = "STOR_PASSWORD";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Entry {
	password: String,
	#[serde(default)]
	auth_mode: Option<String>,
}

impl Drop for Entry {
	fn drop(&mut self) {
		self.password.zeroize();
	}
}

/// File-backed [`SecretStore`] with an optional catch-all password.
#[derive(Default)]
pub struct CliSecretStore {
	entries: HashMap<String, Entry>,
	fallback: Option<Entry>,
}

impl CliSecretStore {
	pub fn load(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path).with_context(|| format!("failed to read secrets file {}", path.display()))?;
		let entries = serde_json::from_str(&content).with_context(|| format!("failed to parse secrets file {}", path.display()))?;
		Ok(Self { entries, fallback: None })
	}

	/// Uses `password` for references the file does not list.
	pub fn with_fallback(mut self, password: Option<String>) -> Self {
		self.fallback = password.map(|password| Entry { password, auth_mode: None });
		self
	}

	/// Reads the catch-all password from [`PASSWORD_ENV`].
	pub fn with_env_fallback(self) -> Self {
		self.with_fallback(std::env::var(PASSWORD_ENV).ok())
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty() && self.fallback.is_none()
	}

	fn lookup(&self, reference: &SecretRef) -> Option<&Entry> {
		self.entries.get(&reference.to_string()).or(self.fallback.as_ref())
	}
}

impl SecretStore for CliSecretStore {
	fn get_secret<'a>(&'a self, reference: &'a SecretRef) -> SecretFuture<'a, Secret> {
		let found = self
			.lookup(reference)
			.map(|entry| Secret::new(entry.password.as_bytes().to_vec(), entry.auth_mode.clone()))
			.ok_or_else(|| reference.not_found());
		Box::pin(async move { found })
	}
}

/// Serves one PEM bundle from disk for every certificate reference.
#[derive(Debug, Clone)]
pub struct PemFileStore {
	path: PathBuf,
}

impl PemFileStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl CertificateStore for PemFileStore {
	fn get_certificate<'a>(&'a self, _reference: &'a SecretRef) -> SecretFuture<'a, Vec<u8>> {
		Box::pin(async move {
			tokio::fs::read(&self.path)
				.await
				.map_err(|err| Error::Secret(format!("cannot read CA bundle {}: {err}", self.path.display())))
		})
	}
}
