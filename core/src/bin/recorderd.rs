use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use rc_core::{
	config::{ElectionMode, RecorderConfig},
	context::AppContext,
	infra::{
		db::Database,
		election::{
			LeaderError, LeadershipGate, LeadershipProvider, LeaseLeadership,
			StandaloneLeadership,
		},
	},
	logging,
	recorder::{source::FileSource, supervisor::PipelineSupervisor},
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "recorderd", about = "Cloud resource recorder daemon")]
struct Args {
	/// Path to the TOML configuration file
	#[arg(long, env = "RECORDER_CONFIG", default_value = "recorder.toml")]
	config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let config = RecorderConfig::load(&args.config)
		.with_context(|| format!("loading {}", args.config.display()))?;

	let _log_guard = logging::init(&config.logging).context("initializing logging")?;

	let db = Database::connect(&config.database)
		.await
		.context("connecting to the canonical store")?;

	let provider: Arc<dyn LeadershipProvider> = match config.election.mode {
		ElectionMode::Lease => Arc::new(LeaseLeadership::new(
			db.conn().clone(),
			config.controller.node_id.clone(),
			config.election.lease_ttl(),
		)),
		ElectionMode::Standalone => {
			Arc::new(StandaloneLeadership::new(config.controller.node_id.clone()))
		}
	};

	// The lease table has to exist before the first probe, the leader migrates again anyway
	if config.election.mode == ElectionMode::Lease {
		db.migrate()
			.await
			.map_err(LeaderError::from)
			.context("preparing the lease table")?;
	}

	let probe_interval = config.election.probe_interval();
	let source = Arc::new(FileSource::new(config.source.directory.clone()));

	info!(
		node_id = %config.controller.node_id,
		domains = config.domains.len(),
		"Starting recorder"
	);

	let supervisor = Arc::new(PipelineSupervisor::new(AppContext::new(config, db), source));
	let gate = LeadershipGate::new(provider, supervisor, probe_interval);

	let shutdown = CancellationToken::new();
	tokio::spawn({
		let shutdown = shutdown.clone();
		async move {
			wait_for_signal().await;
			info!("Received shutdown signal, stopping gracefully...");
			shutdown.cancel();
		}
	});

	if let Err(e) = gate.run(shutdown).await {
		error!(?e, "Recorder stopped on a fatal error");
		return Err(e).context("leadership gate");
	}

	Ok(())
}

async fn wait_for_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!(?e, "Failed to install Ctrl+C handler");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			}
			Err(e) => {
				error!(?e, "Failed to install SIGTERM handler");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {}
		() = terminate => {}
	}
}
