//! Config resolution for the command line.
//!
//! The client config is a [`ClientConfig`] JSON document, read from `--config` or
//! `$XDG_CONFIG_HOME/stor/config.json`. Flags override individual fields.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use stor::{ClientConfig, Collaborators, SecretRef};
use tracing::debug;

use crate::cli::Cli;
use crate::error::{CliError, Result};
use crate::secrets::{CliSecretStore, PemFileStore};

/// Namespace of the secret reference used when the config names none.
pub const DEFAULT_SECRET_NAMESPACE: &str = "stor";

/// Reference under which `--ca-file` bundles are requested.
const CA_FILE_REF: &str = "ca-file";

/// Well-known files under the user config directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
	pub config: PathBuf,
	pub secrets: PathBuf,
}

impl ConfigPaths {
	pub fn new() -> Self {
		let config_home = std::env::var_os("XDG_CONFIG_HOME")
			.map(PathBuf::from)
			.or_else(dirs::config_dir)
			.unwrap_or_else(|| PathBuf::from("."));
		Self::under(&config_home)
	}

	pub fn under(config_home: &Path) -> Self {
		let dir = config_home.join("stor");
		Self {
			config: dir.join("config.json"),
			secrets: dir.join("secrets.json"),
		}
	}
}

impl Default for ConfigPaths {
	fn default() -> Self {
		Self::new()
	}
}

/// Overrides taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
	pub base_urls: Vec<String>,
	pub max_concurrency: Option<usize>,
	pub timeout_secs: Option<u64>,
	pub ca_file: Option<PathBuf>,
}

impl Overrides {
	pub fn from_cli(cli: &Cli) -> Self {
		Self {
			base_urls: cli.base_urls.clone(),
			max_concurrency: cli.max_concurrency,
			timeout_secs: cli.timeout_secs,
			ca_file: cli.ca_file.clone(),
		}
	}

	pub fn apply(&self, config: &mut ClientConfig) {
		if !self.base_urls.is_empty() {
			config.base_urls = self.base_urls.clone();
		}
		if let Some(max) = self.max_concurrency {
			config.max_concurrency = max;
		}
		if let Some(secs) = self.timeout_secs {
			config.request_timeout_secs = secs;
		}
		if self.ca_file.is_some() {
			config.use_certificate = true;
			config.certificate = Some(SecretRef::new(DEFAULT_SECRET_NAMESPACE, CA_FILE_REF));
		}
	}
}

pub fn load_config(path: &Path) -> Result<ClientConfig> {
	if !path.exists() {
		return Err(CliError::ConfigNotFound { path: path.to_path_buf() });
	}
	let content = fs::read_to_string(path).with_context(|| format!("failed to read config {}", path.display()))?;
	let config = serde_json::from_str(&content).map_err(|err| CliError::Config(format!("{}: {err}", path.display())))?;
	debug!(target = "stor", path = %path.display(), "loaded config");
	Ok(config)
}

/// Loads the config file, applies overrides and fills in a secret reference.
pub fn resolve_config(path: &Path, overrides: &Overrides) -> Result<ClientConfig> {
	let mut config = load_config(path)?;
	overrides.apply(&mut config);
	validate(&config)?;

	if config.secret.is_none() {
		config.secret = Some(SecretRef::new(DEFAULT_SECRET_NAMESPACE, config.username.clone()));
	}
	Ok(config)
}

fn validate(config: &ClientConfig) -> Result<()> {
	if config.base_urls.is_empty() {
		return Err(CliError::Config("no base URLs configured".into()));
	}
	if config.username.is_empty() {
		return Err(CliError::Config("username is empty".into()));
	}
	if config.max_concurrency == 0 {
		return Err(CliError::Config("maxConcurrency must be at least 1".into()));
	}
	Ok(())
}

/// Wires the secret store and, with `--ca-file`, the certificate store.
pub fn collaborators(secrets_path: Option<&Path>, default_secrets: &Path, ca_file: Option<&Path>) -> Result<Collaborators> {
	let store = match secrets_path {
		Some(path) => CliSecretStore::load(path)?,
		None if default_secrets.exists() => CliSecretStore::load(default_secrets)?,
		None => CliSecretStore::default(),
	}
	.with_env_fallback();

	if store.is_empty() {
		debug!(target = "stor", "no secrets file and no password in environment");
	}

	let mut collaborators = Collaborators::new(Arc::new(store));
	if let Some(ca_file) = ca_file {
		collaborators = collaborators.with_certificates(Arc::new(PemFileStore::new(ca_file)));
	}
	Ok(collaborators)
}
