//! Leadership term supervisor
//!
//! A term owns everything built while this controller leads: the event bus with its
//! projection subscribers, the per scope caches and one actor per scope driving passes. All of
//! it lives in a single [`ExecutionScope`], so losing leadership is one cancellation.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use rc_actors::{Actor, ExecutionScope, Stopper};
use sea_orm::DatabaseConnection;
use tokio::{sync::Mutex, time::sleep};
use tracing::{debug, error, info, instrument, warn};

use crate::{
	context::AppContext,
	infra::{
		election::{TermError, TermSupervisor},
		event::PubSub,
	},
	tagrecorder::{self, check::ProjectionCheck},
};

use super::{
	cache::{Cache, CacheManager},
	domain::{DomainRecorder, RecorderError},
	registry::DomainRegistry,
	source::{SnapshotSource, SourceError},
	Scope,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PipelineActor {
	Recorder(Scope),
	ProjectionCheck,
}

impl fmt::Display for PipelineActor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Recorder(scope) => write!(f, "recorder:{scope}"),
			Self::ProjectionCheck => write!(f, "projection_check"),
		}
	}
}

struct Term {
	execution: ExecutionScope<PipelineActor>,
	caches: Arc<CacheManager>,
	pubsub: Arc<PubSub>,
}

pub struct PipelineSupervisor {
	ctx: AppContext,
	source: Arc<dyn SnapshotSource>,
	term: Mutex<Option<Term>>,
}

impl PipelineSupervisor {
	pub fn new(ctx: AppContext, source: Arc<dyn SnapshotSource>) -> Self {
		Self {
			ctx,
			source,
			term: Mutex::new(None),
		}
	}

	/// Caches of the running term
	pub async fn caches(&self) -> Option<Arc<CacheManager>> {
		self.term.lock().await.as_ref().map(|term| term.caches.clone())
	}

	pub async fn pubsub(&self) -> Option<Arc<PubSub>> {
		self.term.lock().await.as_ref().map(|term| term.pubsub.clone())
	}

	pub async fn is_running(&self) -> bool {
		self.term.lock().await.is_some()
	}

	pub async fn actors(&self) -> Vec<(String, bool)> {
		match self.term.lock().await.as_ref() {
			Some(term) => term.execution.get_state().await,
			None => Vec::new(),
		}
	}

	async fn build_term(&self) -> Result<Term, TermError> {
		let config = &self.ctx.config;
		let db = self.ctx.db.conn();

		let mut builder = PubSub::builder();
		let checks = tagrecorder::register(&mut builder, db, config);
		let pubsub = Arc::new(builder.build());
		let caches = Arc::new(CacheManager::default());

		let scopes = DomainRegistry::new(db, config).sync(&pubsub, &caches).await?;

		let execution = ExecutionScope::with_stop_timeout(config.recorder.stop_timeout());

		for metadata in scopes {
			let cache = caches
				.insert(Cache::new(metadata, config.recorder.unresolved_warn_every))
				.await;
			let recorder =
				DomainRecorder::new(db.clone(), pubsub.clone(), cache, &config.recorder).await;
			recorder.load_cache().await?;

			execution
				.spawn(RecorderActor {
					recorder,
					source: self.source.clone(),
					pass_interval: config.recorder.pass_interval(),
				})
				.await;
		}

		if config.tagrecorder.check_interval_secs > 0 {
			execution
				.spawn(ProjectionCheckActor {
					db: db.clone(),
					checks,
					interval: Duration::from_secs(config.tagrecorder.check_interval_secs),
				})
				.await;
		}

		Ok(Term {
			execution,
			caches,
			pubsub,
		})
	}
}

#[async_trait]
impl TermSupervisor for PipelineSupervisor {
	#[instrument(skip_all)]
	async fn start_term(&self) -> Result<(), TermError> {
		self.stop_term().await;

		self.ctx.db.migrate().await.map_err(TermError::Migration)?;

		let term = self.build_term().await?;
		let scopes = term.caches.scopes().await.len();
		*self.term.lock().await = Some(term);

		info!(scopes, "Term started");

		Ok(())
	}

	#[instrument(skip_all)]
	async fn stop_term(&self) {
		let Some(term) = self.term.lock().await.take() else {
			return;
		};

		term.execution.cancel_and_wait().await;

		info!("Term stopped");
	}
}

struct RecorderActor {
	recorder: DomainRecorder,
	source: Arc<dyn SnapshotSource>,
	pass_interval: Duration,
}

impl Actor<PipelineActor> for RecorderActor {
	fn identifier(&self) -> PipelineActor {
		PipelineActor::Recorder(self.recorder.scope().clone())
	}

	async fn run(&mut self, stop: Stopper) {
		loop {
			match self.recorder.refresh(self.source.as_ref(), stop.token()).await {
				Ok(_) => {}
				Err(RecorderError::Cancelled) => break,
				Err(RecorderError::Source(e @ SourceError::NotFound(_))) => {
					debug!(scope = %self.recorder.scope(), %e, "Nothing to reconcile yet");
				}
				Err(e) => error!(scope = %self.recorder.scope(), ?e, "Pass failed"),
			}

			tokio::select! {
				() = stop.token().cancelled() => break,
				() = sleep(self.pass_interval) => {}
			}
		}

		debug!(scope = %self.recorder.scope(), "Recorder stopped");
	}
}

struct ProjectionCheckActor {
	db: DatabaseConnection,
	checks: Vec<Arc<dyn ProjectionCheck>>,
	interval: Duration,
}

impl Actor<PipelineActor> for ProjectionCheckActor {
	fn identifier(&self) -> PipelineActor {
		PipelineActor::ProjectionCheck
	}

	async fn run(&mut self, stop: Stopper) {
		loop {
			if let Err(e) = tagrecorder::check::run_checks(&self.db, &self.checks).await {
				warn!(?e, "Projection check failed to load ownership");
			}

			tokio::select! {
				() = stop.token().cancelled() => break,
				() = sleep(self.interval) => {}
			}
		}
	}
}
