//! Subcommand handlers.

use std::time::Instant;

use serde_json::{Value, json};
use stor::{ArrayClient, Args, EndpointRegistry};
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::config::{self, ConfigPaths, Overrides};
use crate::error::{CliError, Result};
use crate::output::{ResultBuilder, print_result};

impl Commands {
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Login => "login",
			Commands::Call { .. } => "call",
			Commands::Count { .. } => "count",
			Commands::List { .. } => "list",
			Commands::Operations => "operations",
		}
	}
}

pub async fn dispatch(cli: Cli) -> Result<()> {
	let started = Instant::now();
	let command = cli.command.name();
	let data = run(cli).await?;

	let result = ResultBuilder::new(command).data(data).duration(started.elapsed()).build();
	print_result(&result);
	Ok(())
}

/// Runs one subcommand and returns the value printed as `data`.
pub async fn run(cli: Cli) -> Result<Value> {
	if let Commands::Operations = cli.command {
		return Ok(operations(&EndpointRegistry::standard()?));
	}

	let client = connect(&cli).await?;
	let outcome = execute(&client, cli.command).await;
	client.close().await;
	outcome
}

async fn connect(cli: &Cli) -> Result<ArrayClient> {
	let paths = ConfigPaths::new();
	let config_path = cli.config.clone().unwrap_or_else(|| paths.config.clone());
	let overrides = Overrides::from_cli(cli);

	let config = config::resolve_config(&config_path, &overrides)?;
	let collaborators = config::collaborators(cli.secrets.as_deref(), &paths.secrets, cli.ca_file.as_deref())?;
	info!(target = "stor", endpoints = config.base_urls.len(), username = %config.username, "connecting");

	Ok(ArrayClient::new(config, collaborators).await?)
}

async fn execute(client: &ArrayClient, command: Commands) -> Result<Value> {
	match command {
		Commands::Login => {
			client.login().await?;
			Ok(json!({
				"baseUrl": client.base_url(),
				"deviceId": client.device_id(),
				"vstoreName": client.vstore_name(),
				"state": client.state().as_str(),
			}))
		}
		Commands::Call { operation, args, method, body } => {
			let body = body.as_deref().map(parse_body).transpose()?;
			let payload = client.call(method.into(), &operation, collect(args), body).await?;
			Ok(payload.to_value())
		}
		Commands::Count { operation, args } => {
			let count = client.count(&operation, collect(args)).await?;
			Ok(json!({ "count": count }))
		}
		Commands::List { operation, args, page_size } => {
			let rows = client.list_all(&operation, collect(args), page_size).await?;
			Ok(json!({ "total": rows.len(), "rows": rows }))
		}
		Commands::Operations => Ok(operations(client.registry())),
	}
}

fn operations(registry: &EndpointRegistry) -> Value {
	registry
		.operations()
		.into_iter()
		.map(|(name, template)| json!({ "operation": name, "path": template.as_str() }))
		.collect()
}

fn collect(pairs: Vec<(String, String)>) -> Args {
	pairs.into_iter().collect()
}

fn parse_body(raw: &str) -> Result<Value> {
	serde_json::from_str(raw).map_err(|err| CliError::InvalidInput(format!("--body is not valid JSON: {err}")))
}
