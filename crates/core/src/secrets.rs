//! Credential and trust-material collaborators.
//!
//! The session layer never stores a password. It asks a [`SecretStore`] for one
//! on every login attempt and wipes the bytes once they are in the request body.
//! A [`BackendDescriptor`] describes where the current secret lives and whether
//! the array certificate must be verified; it is consulted again when the secret
//! reference has gone stale.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stor_runtime::{Error, Result};
use zeroize::{Zeroize, Zeroizing};

/// Boxed future returned by collaborator methods.
pub type SecretFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Location of a secret: `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretRef {
	pub namespace: String,
	pub name: String,
}

impl SecretRef {
	pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			namespace: namespace.into(),
			name: name.into(),
		}
	}

	pub fn not_found(&self) -> Error {
		Error::SecretNotFound {
			namespace: self.namespace.clone(),
			name: self.name.clone(),
		}
	}
}

impl fmt::Display for SecretRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.namespace, self.name)
	}
}

/// Login credential. The password bytes are zeroed when dropped or wiped.
#[derive(Clone)]
pub struct Secret {
	password: Zeroizing<Vec<u8>>,
	auth_mode: Option<String>,
}

impl Secret {
	pub fn new(password: impl Into<Vec<u8>>, auth_mode: Option<String>) -> Self {
		Self {
			password: Zeroizing::new(password.into()),
			auth_mode,
		}
	}

	pub fn password(&self) -> &[u8] {
		&self.password
	}

	/// Login scope override carried with the credential.
	pub fn auth_mode(&self) -> Option<&str> {
		self.auth_mode.as_deref()
	}

	/// Overwrites the password bytes with zeros and empties them.
	pub fn wipe(&mut self) {
		self.password.zeroize();
	}

	pub fn is_wiped(&self) -> bool {
		self.password.is_empty()
	}
}

impl fmt::Debug for Secret {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Secret").field("password", &"******").field("auth_mode", &self.auth_mode).finish()
	}
}

/// Source of login credentials.
pub trait SecretStore: Send + Sync {
	/// Fails with [`Error::SecretNotFound`] when nothing is stored under the reference.
	fn get_secret<'a>(&'a self, reference: &'a SecretRef) -> SecretFuture<'a, Secret>;
}

/// Source of PEM-encoded CA bundles.
pub trait CertificateStore: Send + Sync {
	fn get_certificate<'a>(&'a self, reference: &'a SecretRef) -> SecretFuture<'a, Vec<u8>>;
}

/// Live description of the storage backend this client serves.
pub trait BackendDescriptor: Send + Sync {
	/// Current reference to the login secret.
	fn secret_ref(&self) -> SecretFuture<'_, SecretRef>;

	/// Whether the array certificate must be verified.
	fn use_certificate(&self) -> SecretFuture<'_, bool>;

	/// Reference to the CA bundle used when verification is on.
	fn certificate_ref(&self) -> SecretFuture<'_, Option<SecretRef>>;
}

/// The collaborators a client is wired with.
#[derive(Clone)]
pub struct Collaborators {
	pub secrets: Arc<dyn SecretStore>,
	pub certificates: Option<Arc<dyn CertificateStore>>,
	pub backend: Option<Arc<dyn BackendDescriptor>>,
}

impl Collaborators {
	pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
		Self {
			secrets,
			certificates: None,
			backend: None,
		}
	}

	pub fn with_certificates(mut self, certificates: Arc<dyn CertificateStore>) -> Self {
		self.certificates = Some(certificates);
		self
	}

	pub fn with_backend(mut self, backend: Arc<dyn BackendDescriptor>) -> Self {
		self.backend = Some(backend);
		self
	}
}

impl fmt::Debug for Collaborators {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Collaborators")
			.field("certificates", &self.certificates.is_some())
			.field("backend", &self.backend.is_some())
			.finish_non_exhaustive()
	}
}

/// In-memory [`SecretStore`] and [`CertificateStore`].
#[derive(Default)]
pub struct MemoryStore {
	secrets: parking_lot::RwLock<HashMap<SecretRef, Secret>>,
	certificates: parking_lot::RwLock<HashMap<SecretRef, Vec<u8>>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert_secret(&self, reference: SecretRef, secret: Secret) {
		self.secrets.write().insert(reference, secret);
	}

	pub fn remove_secret(&self, reference: &SecretRef) -> Option<Secret> {
		self.secrets.write().remove(reference)
	}

	pub fn insert_certificate(&self, reference: SecretRef, pem: impl Into<Vec<u8>>) {
		self.certificates.write().insert(reference, pem.into());
	}
}

impl SecretStore for MemoryStore {
	fn get_secret<'a>(&'a self, reference: &'a SecretRef) -> SecretFuture<'a, Secret> {
		let found = self.secrets.read().get(reference).cloned();
		Box::pin(async move { found.ok_or_else(|| reference.not_found()) })
	}
}

impl CertificateStore for MemoryStore {
	fn get_certificate<'a>(&'a self, reference: &'a SecretRef) -> SecretFuture<'a, Vec<u8>> {
		let found = self.certificates.read().get(reference).cloned();
		Box::pin(async move { found.ok_or_else(|| reference.not_found()) })
	}
}

/// [`BackendDescriptor`] with fixed answers that can be swapped at runtime.
#[derive(Debug)]
pub struct StaticBackend {
	secret: parking_lot::RwLock<SecretRef>,
	certificate: Option<SecretRef>,
	use_certificate: bool,
}

impl StaticBackend {
	pub fn new(secret: SecretRef) -> Self {
		Self {
			secret: parking_lot::RwLock::new(secret),
			certificate: None,
			use_certificate: false,
		}
	}

	pub fn with_certificate(mut self, certificate: SecretRef) -> Self {
		self.certificate = Some(certificate);
		self.use_certificate = true;
		self
	}

	pub fn set_secret_ref(&self, secret: SecretRef) {
		*self.secret.write() = secret;
	}
}

impl BackendDescriptor for StaticBackend {
	fn secret_ref(&self) -> SecretFuture<'_, SecretRef> {
		let secret = self.secret.read().clone();
		Box::pin(async move { Ok(secret) })
	}

	fn use_certificate(&self) -> SecretFuture<'_, bool> {
		let use_certificate = self.use_certificate;
		Box::pin(async move { Ok(use_certificate) })
	}

	fn certificate_ref(&self) -> SecretFuture<'_, Option<SecretRef>> {
		let certificate = self.certificate.clone();
		Box::pin(async move { Ok(certificate) })
	}
}
