use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Filter directives for a `-v` count.
pub fn filter_for(verbosity: u8) -> &'static str {
	// 0 = warnings only
	// 1 (-v) = session and retry events, HTTP stack kept quiet
	// 2+ (-vv) = every request, bodies masked
	match verbosity {
		0 => "warn",
		1 => "info,hyper_util=warn,reqwest=warn",
		_ => "debug",
	}
}

pub fn init_logging(verbosity: u8) {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_for(verbosity)));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
