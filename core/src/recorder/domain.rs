//! Pass driver of one reconciliation scope
//!
//! Adds and updates walk the resource types in dependency order, deletes walk them backwards
//! so dependents leave before what they point at. Cancellation is honored between resource
//! types only, a batch that started always commits.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{config::ReconcileConfig, infra::event::PubSub};

use super::{
	cache::Cache,
	cloud::CloudSnapshot,
	operator::StoreError,
	order::{self, OrderError},
	source::{SnapshotSource, SourceError},
	updater::{updater_for, PassContext, PassReport, ResourceUpdater},
	ResourceType, Scope,
};

#[derive(Debug, Error)]
pub enum RecorderError {
	#[error(transparent)]
	Source(#[from] SourceError),

	#[error(transparent)]
	Store(#[from] StoreError),

	#[error(transparent)]
	Order(#[from] OrderError),

	#[error("Pass cancelled")]
	Cancelled,
}

pub type Result<T> = std::result::Result<T, RecorderError>;

pub struct DomainRecorder {
	scope: Scope,
	db: DatabaseConnection,
	pubsub: Arc<PubSub>,
	cache: Arc<RwLock<Cache>>,
	updaters: Vec<Box<dyn ResourceUpdater>>,
}

impl DomainRecorder {
	pub async fn new(
		db: DatabaseConnection,
		pubsub: Arc<PubSub>,
		cache: Arc<RwLock<Cache>>,
		config: &ReconcileConfig,
	) -> Self {
		let scope = cache.read().await.metadata().scope();
		let updaters = order::default_order()
			.into_iter()
			.map(|resource_type| updater_for(resource_type, config))
			.collect();

		Self {
			scope,
			db,
			pubsub,
			cache,
			updaters,
		}
	}

	/// Replaces the resource type order. Types left out aren't reconciled at all.
	pub fn with_order(mut self, order: &[ResourceType], config: &ReconcileConfig) -> Result<Self> {
		let mut seen = Vec::with_capacity(order.len());
		for resource_type in order {
			if seen.contains(resource_type) {
				return Err(OrderError::Duplicate(*resource_type).into());
			}
			seen.push(*resource_type);
		}

		self.updaters = order
			.iter()
			.map(|resource_type| updater_for(*resource_type, config))
			.collect();

		Ok(self)
	}

	pub fn scope(&self) -> &Scope {
		&self.scope
	}

	pub fn order(&self) -> Vec<ResourceType> {
		self.updaters.iter().map(|u| u.resource_type()).collect()
	}

	/// Rebuilds the cache from the scope's live rows
	#[instrument(skip(self), fields(scope = %self.scope))]
	pub async fn load_cache(&self) -> Result<usize> {
		let mut cache = self.cache.write().await;
		let mut loaded = 0;

		for updater in &self.updaters {
			let count = updater.load(&self.db, &mut cache).await?;
			debug!(resource_type = %updater.resource_type(), count, "Loaded rows into cache");
			loaded += count;
		}

		info!(loaded, "Cache loaded");

		Ok(loaded)
	}

	/// Fetches the scope's snapshot and reconciles it
	pub async fn refresh(
		&self,
		source: &dyn SnapshotSource,
		stop: &CancellationToken,
	) -> Result<PassReport> {
		let snapshot = source.fetch(&self.scope).await?;
		self.run_pass(&snapshot, stop).await
	}

	#[instrument(skip_all, fields(scope = %self.scope))]
	pub async fn run_pass(
		&self,
		snapshot: &CloudSnapshot,
		stop: &CancellationToken,
	) -> Result<PassReport> {
		let ctx = PassContext {
			db: &self.db,
			pubsub: &self.pubsub,
			snapshot,
		};
		let mut report = PassReport::default();

		for updater in &self.updaters {
			if stop.is_cancelled() {
				info!("Pass interrupted before adds and updates completed");
				return Err(RecorderError::Cancelled);
			}

			if snapshot.is_failed(updater.resource_type()) {
				warn!(
					resource_type = %updater.resource_type(),
					"Collector failed to fetch resource type, leaving it untouched"
				);
				continue;
			}

			let mut cache = self.cache.write().await;
			updater
				.handle_add_and_update(&ctx, &mut cache, &mut report)
				.await;
		}

		for updater in self.updaters.iter().rev() {
			if stop.is_cancelled() {
				info!("Pass interrupted before deletes completed");
				return Err(RecorderError::Cancelled);
			}

			if snapshot.is_failed(updater.resource_type()) {
				continue;
			}

			let mut cache = self.cache.write().await;
			updater.handle_delete(&ctx, &mut cache, &mut report).await;
		}

		let sequence = self.cache.write().await.advance();

		if report.is_noop() && report.skipped == 0 {
			debug!(sequence, "Pass completed without changes");
		} else {
			info!(
				sequence,
				added = report.added,
				updated = report.updated,
				deleted = report.deleted,
				skipped = report.skipped,
				failed_batches = report.failed_batches,
				"Pass completed"
			);
		}

		Ok(report)
	}
}
