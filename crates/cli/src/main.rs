use clap::Parser;
use stor_cli::cli::Cli;
use stor_cli::error::CliError;
use stor_cli::output::{self, ResultBuilder};
use stor_cli::{commands, logging};
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let command = cli.command.name();
	if let Err(err) = commands::dispatch(cli).await {
		handle_error(command, &err);
		std::process::exit(1);
	}
}

fn handle_error(command: &str, err: &CliError) {
	error!(target = "stor", command, error = %err, "command failed");

	let cmd_error = err.to_command_error();
	output::print_error_stderr(&cmd_error);

	let result: output::CommandResult<()> = ResultBuilder::new(command).error(cmd_error).build();
	output::print_result(&result);
}
