//! Tracing setup for the recorder daemon

use std::{fs, io, path::Path};

use tracing_appender::{
	non_blocking::WorkerGuard,
	rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
	#[error("Failed to create logs directory {path}: {source}")]
	Directory {
		path: String,
		source: io::Error,
	},

	#[error("Failed to initialize tracing: {0}")]
	Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs the global subscriber: stdout always, plus a daily rotated file when a directory
/// is configured. The returned guard must be held for as long as file logging is wanted.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

	let stdout_layer = fmt::layer()
		.with_target(true)
		.with_thread_ids(true)
		.with_writer(io::stdout);

	let Some(directory) = &config.directory else {
		tracing_subscriber::registry()
			.with(env_filter)
			.with(stdout_layer)
			.try_init()?;

		return Ok(None);
	};

	let (file_writer, guard) = tracing_appender::non_blocking(file_appender(directory)?);

	tracing_subscriber::registry()
		.with(env_filter)
		.with(stdout_layer)
		.with(
			fmt::layer()
				.with_target(true)
				.with_thread_ids(true)
				.with_ansi(false) // No ANSI colors in log files
				.with_writer(file_writer),
		)
		.try_init()?;

	Ok(Some(guard))
}

fn file_appender(directory: &Path) -> Result<RollingFileAppender, LoggingError> {
	fs::create_dir_all(directory).map_err(|source| LoggingError::Directory {
		path: directory.display().to_string(),
		source,
	})?;

	Ok(RollingFileAppender::new(
		Rotation::DAILY,
		directory,
		"recorderd.log",
	))
}
