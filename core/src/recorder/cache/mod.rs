//! Per scope recorder cache
//!
//! A [`Cache`] is owned by the actor reconciling its scope: nothing else mutates it. Readers
//! go through the [`CacheManager`] and take a read lock, so they may observe an entry a pass
//! is about to replace.

use std::{collections::HashMap, sync::Arc};

use sea_orm::DatabaseConnection;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::{
	metadata::{Metadata, Scope},
	operator::{self, StoreError},
	updater::Reconcilable,
	DeviceType, ResourceType,
};

pub mod diffbase;
pub mod tool;
pub mod unresolved;

pub use diffbase::{DiffBase, DiffBaseDataSet};
pub use tool::{DeviceOptions, ToolDataSet, Unresolved};
pub use unresolved::UnresolvedTracker;

#[derive(Debug)]
pub struct Cache {
	metadata: Metadata,
	sequence: u64,
	pub diff_bases: DiffBaseDataSet,
	pub tool: ToolDataSet,
	pub unresolved: UnresolvedTracker,
}

impl Cache {
	pub fn new(metadata: Metadata, unresolved_warn_every: u32) -> Self {
		Self {
			metadata,
			sequence: 0,
			diff_bases: DiffBaseDataSet::default(),
			tool: ToolDataSet::default(),
			unresolved: UnresolvedTracker::new(unresolved_warn_every),
		}
	}

	pub fn metadata(&self) -> &Metadata {
		&self.metadata
	}

	pub fn sequence(&self) -> u64 {
		self.sequence
	}

	/// Marks the end of a completed pass
	pub fn advance(&mut self) -> u64 {
		self.sequence += 1;
		self.sequence
	}

	/// Makes sure the tool index knows `lcuuid` if the store does.
	///
	/// Resources reconciled by another scope (a sub domain's cluster pointing at its domain's
	/// VPC) are only found this way. Hits are memoized, misses are asked again next time.
	pub async fn warm(
		&mut self,
		db: &DatabaseConnection,
		resource_type: ResourceType,
		lcuuid: &str,
	) -> Result<bool, StoreError> {
		if lcuuid.is_empty() {
			return Ok(false);
		}

		if self.tool.id(resource_type, lcuuid).is_some() {
			return Ok(true);
		}

		match operator::lookup_live_id(db, resource_type, lcuuid).await? {
			Some(id) => {
				trace!(%resource_type, lcuuid, id, "Warmed tool index from store");
				self.tool.register(resource_type, lcuuid, id);
				Ok(true)
			}
			None => Ok(false),
		}
	}
}

/// Caches of every scope reconciled during the current leadership term
#[derive(Debug, Default)]
pub struct CacheManager {
	caches: RwLock<HashMap<Scope, Arc<RwLock<Cache>>>>,
}

impl CacheManager {
	pub async fn insert(&self, cache: Cache) -> Arc<RwLock<Cache>> {
		let scope = cache.metadata().scope();
		let cache = Arc::new(RwLock::new(cache));

		self.caches.write().await.insert(scope, Arc::clone(&cache));

		cache
	}

	pub async fn get(&self, scope: &Scope) -> Option<Arc<RwLock<Cache>>> {
		self.caches.read().await.get(scope).cloned()
	}

	pub async fn remove(&self, scope: &Scope) -> bool {
		let removed = self.caches.write().await.remove(scope).is_some();
		if removed {
			debug!(%scope, "Dropped cache partition");
		}
		removed
	}

	/// Drops a domain partition together with the partitions of its sub domains
	pub async fn remove_domain(&self, domain: &str) -> usize {
		let mut caches = self.caches.write().await;
		let before = caches.len();
		caches.retain(|scope, _| scope.domain != domain);
		before - caches.len()
	}

	pub async fn scopes(&self) -> Vec<Scope> {
		let mut scopes = self.caches.read().await.keys().cloned().collect::<Vec<_>>();
		scopes.sort();
		scopes
	}

	pub async fn get_entry<R: Reconcilable>(
		&self,
		scope: &Scope,
		lcuuid: &str,
	) -> Option<R::DiffBase> {
		let cache = self.get(scope).await?;
		let cache = cache.read().await;

		R::diff_bases(&cache.diff_bases).get(lcuuid).cloned()
	}

	pub async fn surrogate_id(
		&self,
		scope: &Scope,
		resource_type: ResourceType,
		lcuuid: &str,
	) -> Option<i32> {
		let cache = self.get(scope).await?;
		let id = cache.read().await.tool.id(resource_type, lcuuid);
		id
	}

	pub async fn sequence(&self, scope: &Scope) -> Option<u64> {
		let cache = self.get(scope).await?;
		let sequence = cache.read().await.sequence();
		Some(sequence)
	}

	pub async fn advance(&self, scope: &Scope) -> Option<u64> {
		let cache = self.get(scope).await?;
		let sequence = cache.write().await.advance();
		Some(sequence)
	}

	pub async fn device_options(
		&self,
		scope: &Scope,
		device_type: DeviceType,
		id: i32,
	) -> Option<DeviceOptions> {
		let cache = self.get(scope).await?;
		let options = cache.read().await.tool.device_options(device_type, id).cloned();
		options
	}
}
