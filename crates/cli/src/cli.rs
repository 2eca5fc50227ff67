use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use stor::DEFAULT_PAGE_SIZE;

#[derive(Parser, Debug)]
#[command(name = "stor")]
#[command(about = "Storage array REST client with session recovery and busy retries")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Client config file (defaults to $XDG_CONFIG_HOME/stor/config.json)
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Secrets file mapping `namespace/name` to credentials
	#[arg(long, global = true, value_name = "FILE")]
	pub secrets: Option<PathBuf>,

	/// PEM bundle used to verify the array certificate
	#[arg(long, global = true, value_name = "FILE")]
	pub ca_file: Option<PathBuf>,

	/// Candidate REST root; repeat to replace the configured list
	#[arg(long = "base-url", global = true, value_name = "URL")]
	pub base_urls: Vec<String>,

	/// Maximum number of requests in flight
	#[arg(long, global = true)]
	pub max_concurrency: Option<usize>,

	/// Per-request timeout in seconds
	#[arg(long, global = true)]
	pub timeout_secs: Option<u64>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Open a session and print where it landed
	Login,

	/// Invoke a registered operation and print its payload
	Call {
		operation: String,
		/// Path argument, `key=value`
		#[arg(short = 'a', long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_val)]
		args: Vec<(String, String)>,
		#[arg(short, long, value_enum, default_value = "get")]
		method: HttpMethod,
		/// JSON request body
		#[arg(short, long, value_name = "JSON")]
		body: Option<String>,
	},

	/// Print the `COUNT` of a count operation
	Count {
		operation: String,
		#[arg(short = 'a', long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_val)]
		args: Vec<(String, String)>,
	},

	/// Fetch every row of a list operation
	List {
		operation: String,
		#[arg(short = 'a', long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_val)]
		args: Vec<(String, String)>,
		#[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
		page_size: usize,
	},

	/// List registered operations and their path templates
	Operations,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum HttpMethod {
	#[default]
	Get,
	Post,
	Put,
	Delete,
}

impl From<HttpMethod> for stor::Method {
	fn from(method: HttpMethod) -> Self {
		match method {
			HttpMethod::Get => stor::Method::GET,
			HttpMethod::Post => stor::Method::POST,
			HttpMethod::Put => stor::Method::PUT,
			HttpMethod::Delete => stor::Method::DELETE,
		}
	}
}

/// Parses `key=value`. The value may itself contain `=`.
pub fn parse_key_val(raw: &str) -> Result<(String, String), String> {
	match raw.split_once('=') {
		Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
		_ => Err(format!("expected KEY=VALUE, got '{raw}'")),
	}
}
