//! Generic resource updater
//!
//! Every resource type is reconciled by the same algorithm, [`Updater`], parameterized by a
//! [`Reconcilable`] implementation describing how descriptors map onto canonical rows.
//!
//! A pass over one type:
//! 1. Classifies each descriptor against the diff bases: unknown ones are staged for insert,
//!    known ones for an update when a tracked field changed. Descriptors whose references
//!    can't be resolved yet are skipped and retried next pass.
//! 2. Commits the staged rows batch by batch, then updates the cache from what the store
//!    returned and publishes the changes.
//! 3. Deletes (in a separate step driven in reverse order) rows whose lcuuid vanished.
//!
//! A batch the store rejects leaves both the cache and the bus untouched, the next pass
//! computes the same batch again.

use std::{
	collections::{HashMap, HashSet},
	fmt::Debug,
	marker::PhantomData,
};

use async_trait::async_trait;
use sea_orm::{
	ActiveModelBehavior, ActiveModelTrait, DatabaseConnection, FromQueryResult, IntoActiveModel,
};
use tracing::{debug, error, warn};

use crate::{
	config::ReconcileConfig,
	infra::{
		db::entities::CanonicalEntity,
		event::{ChangeMessage, PubSub},
	},
};

use super::{
	cache::{Cache, DiffBase, DiffBaseDataSet, ToolDataSet, Unresolved},
	cloud::CloudSnapshot,
	field::{FieldChanges, FieldsUpdate},
	operator::{Operator, StoreError},
	DeletionMode, ResourceType, Scope,
};

mod az;
mod host;
mod lb;
mod lb_vm_connection;
mod network;
mod peer_connection;
mod pod_cluster;
mod pod_service;
mod region;
mod vm;
mod vpc;
mod vrouter;

pub use az::Az;
pub use host::Host;
pub use lb::Lb;
pub use lb_vm_connection::LbVmConnection;
pub use network::Network;
pub use peer_connection::PeerConnection;
pub use pod_cluster::PodCluster;
pub use pod_service::PodService;
pub use region::Region;
pub use vm::Vm;
pub use vpc::Vpc;
pub use vrouter::Vrouter;

/// How descriptors of one resource type become canonical rows
pub trait Reconcilable: Send + Sync + 'static {
	const RESOURCE_TYPE: ResourceType;

	type Cloud: Clone + Debug + Send + Sync + 'static;
	type Row: Clone
		+ Debug
		+ FromQueryResult
		+ IntoActiveModel<Self::Active>
		+ Send
		+ Sync
		+ 'static;
	type Active: ActiveModelTrait<Entity = Self::Entity> + ActiveModelBehavior + Send + Sync + 'static;
	type Entity: CanonicalEntity<Model = Self::Row, ActiveModel = Self::Active>;
	type DiffBase: DiffBase + for<'a> From<&'a Self::Row>;

	fn cloud_items(snapshot: &CloudSnapshot) -> &[Self::Cloud];

	fn lcuuid(cloud: &Self::Cloud) -> &str;

	/// References resolved into surrogate ids when the row is built
	fn references(cloud: &Self::Cloud) -> Vec<(ResourceType, &str)> {
		let _ = cloud;
		vec![]
	}

	fn diff_bases(set: &DiffBaseDataSet) -> &HashMap<String, Self::DiffBase>;

	fn diff_bases_mut(set: &mut DiffBaseDataSet) -> &mut HashMap<String, Self::DiffBase>;

	/// Row for a descriptor seen for the first time. Scope and timestamps are filled in by
	/// the operator.
	fn generate_to_add(cloud: &Self::Cloud, tool: &ToolDataSet) -> Result<Self::Active, Unresolved>;

	/// Tracked fields of `base` that differ from the descriptor, possibly none
	fn generate_update(
		cloud: &Self::Cloud,
		base: &Self::DiffBase,
		tool: &ToolDataSet,
	) -> Result<FieldChanges, Unresolved>;

	/// Extra lookups derived from a committed row
	fn index_extra(row: &Self::Row, tool: &mut ToolDataSet) {
		let _ = (row, tool);
	}

	fn unindex_extra(base: &Self::DiffBase, tool: &mut ToolDataSet) {
		let _ = (base, tool);
	}
}

/// Counters of one pass, merged across resource types by the pass driver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
	pub added: usize,
	pub updated: usize,
	pub deleted: usize,
	/// Descriptors left for a later pass because a reference didn't resolve
	pub skipped: usize,
	/// Batches the store rejected, retried next pass
	pub failed_batches: usize,
	/// Successful subscriber deliveries
	pub published: usize,
}

impl PassReport {
	pub fn merge(&mut self, other: &PassReport) {
		self.added += other.added;
		self.updated += other.updated;
		self.deleted += other.deleted;
		self.skipped += other.skipped;
		self.failed_batches += other.failed_batches;
		self.published += other.published;
	}

	/// Nothing was written and nothing published
	pub fn is_noop(&self) -> bool {
		self.added == 0 && self.updated == 0 && self.deleted == 0 && self.published == 0
	}
}

pub struct PassContext<'a> {
	pub db: &'a DatabaseConnection,
	pub pubsub: &'a PubSub,
	pub snapshot: &'a CloudSnapshot,
}

/// Object safe face of [`Updater`], one per resource type in the pass driver
#[async_trait]
pub trait ResourceUpdater: Send + Sync {
	fn resource_type(&self) -> ResourceType;

	fn deletion_mode(&self) -> DeletionMode;

	/// Fills the cache with the scope's live rows, returns how many were loaded
	async fn load(&self, db: &DatabaseConnection, cache: &mut Cache) -> Result<usize, StoreError>;

	async fn handle_add_and_update(
		&self,
		ctx: &PassContext<'_>,
		cache: &mut Cache,
		report: &mut PassReport,
	);

	async fn handle_delete(&self, ctx: &PassContext<'_>, cache: &mut Cache, report: &mut PassReport);

	/// Removes every row of the scope, soft deleted ones included
	async fn purge(&self, db: &DatabaseConnection, scope: &Scope) -> Result<u64, StoreError>;
}

pub struct Updater<R> {
	deletion: DeletionMode,
	batch_size: usize,
	_marker: PhantomData<fn() -> R>,
}

impl<R: Reconcilable> Updater<R> {
	pub fn new(deletion: DeletionMode, batch_size: usize) -> Self {
		Self {
			deletion,
			batch_size: batch_size.max(1),
			_marker: PhantomData,
		}
	}

	pub fn from_config(config: &ReconcileConfig) -> Self {
		Self::new(config.deletion_mode(R::RESOURCE_TYPE), config.batch_size)
	}

	fn index(row: &R::Row, cache: &mut Cache) {
		let base = R::DiffBase::from(row);

		cache
			.tool
			.register(R::RESOURCE_TYPE, base.lcuuid(), base.id());
		R::index_extra(row, &mut cache.tool);

		R::diff_bases_mut(&mut cache.diff_bases).insert(base.lcuuid().to_string(), base);
	}

	async fn commit_inserts(
		&self,
		ctx: &PassContext<'_>,
		cache: &mut Cache,
		staged: Vec<(String, R::Active)>,
		report: &mut PassReport,
	) {
		let scope = cache.metadata().scope();
		let operator = Operator::<R::Entity>::new(ctx.db, &scope);

		for chunk in chunked(staged, self.batch_size) {
			let count = chunk.len();
			let mut pending = chunk
				.iter()
				.map(|(lcuuid, _)| lcuuid.clone())
				.collect::<HashSet<_>>();

			let rows = match operator.insert(chunk).await {
				Ok(rows) => rows,
				Err(e) => {
					error!(
						resource_type = %R::RESOURCE_TYPE,
						%scope,
						count,
						?e,
						"Failed to insert batch, retrying next pass"
					);
					report.failed_batches += 1;
					continue;
				}
			};

			for row in &rows {
				pending.remove(R::Entity::lcuuid_of(row));
				Self::index(row, cache);
			}

			for lcuuid in pending {
				warn!(
					resource_type = %R::RESOURCE_TYPE,
					%scope,
					%lcuuid,
					"Lcuuid held by a live row of another scope, skipping"
				);
				report.skipped += 1;
			}

			if rows.is_empty() {
				continue;
			}

			report.added += rows.len();
			report.published += ctx
				.pubsub
				.publish(
					R::RESOURCE_TYPE,
					&ChangeMessage::added(cache.metadata().clone(), rows),
				)
				.await;
		}
	}

	async fn commit_updates(
		&self,
		ctx: &PassContext<'_>,
		cache: &mut Cache,
		staged: Vec<FieldsUpdate>,
		report: &mut PassReport,
	) {
		let scope = cache.metadata().scope();
		let operator = Operator::<R::Entity>::new(ctx.db, &scope);

		for chunk in chunked(staged, self.batch_size) {
			let rows = match operator.update(&chunk).await {
				Ok(rows) => rows,
				Err(e) => {
					error!(
						resource_type = %R::RESOURCE_TYPE,
						%scope,
						count = chunk.len(),
						?e,
						"Failed to update batch, retrying next pass"
					);
					report.failed_batches += 1;
					continue;
				}
			};

			let mut rows = rows
				.into_iter()
				.map(|row| (R::Entity::id_of(&row), row))
				.collect::<HashMap<_, _>>();

			for update in chunk {
				let Some(row) = rows.remove(&update.id) else {
					// Forgetting the entry lets the next pass add the row again
					warn!(
						resource_type = %R::RESOURCE_TYPE,
						%scope,
						lcuuid = %update.lcuuid,
						"Updated row vanished from the store"
					);
					cache.tool.unregister(R::RESOURCE_TYPE, &update.lcuuid);
					if let Some(old) = R::diff_bases_mut(&mut cache.diff_bases).remove(&update.lcuuid) {
						R::unindex_extra(&old, &mut cache.tool);
					}
					continue;
				};

				if let Some(old) = R::diff_bases_mut(&mut cache.diff_bases).remove(&update.lcuuid) {
					R::unindex_extra(&old, &mut cache.tool);
				}
				Self::index(&row, cache);

				report.updated += 1;
				report.published += ctx
					.pubsub
					.publish(
						R::RESOURCE_TYPE,
						&ChangeMessage::updated(cache.metadata().clone(), update, row),
					)
					.await;
			}
		}
	}
}

#[async_trait]
impl<R: Reconcilable> ResourceUpdater for Updater<R> {
	fn resource_type(&self) -> ResourceType {
		R::RESOURCE_TYPE
	}

	fn deletion_mode(&self) -> DeletionMode {
		self.deletion
	}

	async fn load(&self, db: &DatabaseConnection, cache: &mut Cache) -> Result<usize, StoreError> {
		let scope = cache.metadata().scope();
		let rows = Operator::<R::Entity>::new(db, &scope).load().await?;

		for row in &rows {
			Self::index(row, cache);
		}

		Ok(rows.len())
	}

	async fn handle_add_and_update(
		&self,
		ctx: &PassContext<'_>,
		cache: &mut Cache,
		report: &mut PassReport,
	) {
		let resource_type = R::RESOURCE_TYPE;
		let scope = cache.metadata().scope();

		let mut to_add = Vec::new();
		let mut to_update = Vec::new();
		let mut present = HashSet::new();

		for item in R::cloud_items(ctx.snapshot) {
			let lcuuid = R::lcuuid(item);

			if lcuuid.is_empty() {
				warn!(%resource_type, %scope, ?item, "Descriptor without lcuuid ignored");
				continue;
			}

			if !present.insert(lcuuid) {
				debug!(%resource_type, %scope, lcuuid, "Duplicate descriptor ignored");
				continue;
			}

			for (reference_type, reference) in R::references(item) {
				if let Err(e) = cache.warm(ctx.db, reference_type, reference).await {
					error!(
						%resource_type,
						%scope,
						lcuuid,
						%reference_type,
						reference,
						?e,
						"Failed to look up reference in store"
					);
				}
			}

			let staged = match R::diff_bases(&cache.diff_bases).get(lcuuid) {
				None => R::generate_to_add(item, &cache.tool)
					.map(|model| Some(Staged::Add(lcuuid.to_string(), model))),
				Some(base) => R::generate_update(item, base, &cache.tool).map(|changes| {
					(!changes.is_empty()).then(|| {
						Staged::Update(FieldsUpdate {
							id: base.id(),
							lcuuid: lcuuid.to_string(),
							changes,
						})
					})
				}),
			};

			match staged {
				Ok(staged) => {
					cache.unresolved.resolved(resource_type, lcuuid);

					match staged {
						Some(Staged::Add(lcuuid, model)) => to_add.push((lcuuid, model)),
						Some(Staged::Update(update)) => to_update.push(update),
						None => {}
					}
				}
				Err(Unresolved {
					resource_type: missing_type,
					lcuuid: missing,
				}) => {
					report.skipped += 1;

					let attempts = cache.unresolved.miss(resource_type, lcuuid);
					if cache.unresolved.should_warn(attempts) {
						warn!(
							%resource_type,
							%scope,
							lcuuid,
							%missing_type,
							missing,
							attempts,
							"Reference not resolved, skipping until it is recorded"
						);
					} else {
						debug!(
							%resource_type,
							%scope,
							lcuuid,
							%missing_type,
							missing,
							attempts,
							"Reference still not resolved"
						);
					}
				}
			}
		}

		cache.unresolved.retain_present(resource_type, &present);

		if !to_add.is_empty() {
			self.commit_inserts(ctx, cache, to_add, report).await;
		}

		if !to_update.is_empty() {
			self.commit_updates(ctx, cache, to_update, report).await;
		}
	}

	async fn handle_delete(&self, ctx: &PassContext<'_>, cache: &mut Cache, report: &mut PassReport) {
		let present = R::cloud_items(ctx.snapshot)
			.iter()
			.map(R::lcuuid)
			.collect::<HashSet<_>>();

		let mut to_delete = R::diff_bases(&cache.diff_bases)
			.keys()
			.filter(|lcuuid| !present.contains(lcuuid.as_str()))
			.cloned()
			.collect::<Vec<_>>();

		if to_delete.is_empty() {
			return;
		}

		to_delete.sort();

		let scope = cache.metadata().scope();
		let operator = Operator::<R::Entity>::new(ctx.db, &scope);

		for chunk in chunked(to_delete, self.batch_size) {
			let rows = match operator.delete(self.deletion, &chunk).await {
				Ok(rows) => rows,
				Err(e) => {
					error!(
						resource_type = %R::RESOURCE_TYPE,
						%scope,
						count = chunk.len(),
						?e,
						"Failed to delete batch, retrying next pass"
					);
					report.failed_batches += 1;
					continue;
				}
			};

			// Entries without a live row in the scope are stale either way
			for lcuuid in &chunk {
				cache.tool.unregister(R::RESOURCE_TYPE, lcuuid);

				if let Some(base) = R::diff_bases_mut(&mut cache.diff_bases).remove(lcuuid) {
					R::unindex_extra(&base, &mut cache.tool);
				}
			}

			if rows.len() < chunk.len() {
				debug!(
					resource_type = %R::RESOURCE_TYPE,
					%scope,
					missing = chunk.len() - rows.len(),
					"Rows already gone from the store"
				);
			}

			if rows.is_empty() {
				continue;
			}

			let lcuuids = rows
				.iter()
				.map(|row| R::Entity::lcuuid_of(row).to_string())
				.collect::<Vec<_>>();

			report.deleted += rows.len();
			report.published += ctx
				.pubsub
				.publish(
					R::RESOURCE_TYPE,
					&ChangeMessage::deleted(cache.metadata().clone(), lcuuids, rows),
				)
				.await;
		}
	}

	async fn purge(&self, db: &DatabaseConnection, scope: &Scope) -> Result<u64, StoreError> {
		Operator::<R::Entity>::new(db, scope).purge().await
	}
}

/// Keeps the stored id while the descriptor still points at the same resource, resolves the
/// new reference otherwise
pub(crate) fn resolve_reference(
	tool: &ToolDataSet,
	resource_type: ResourceType,
	current: i32,
	lcuuid: &str,
) -> Result<i32, Unresolved> {
	match tool.lcuuid(resource_type, current) {
		Some(known) if known == lcuuid => Ok(current),
		_ => tool.resolve(resource_type, lcuuid),
	}
}

enum Staged<A> {
	Add(String, A),
	Update(FieldsUpdate),
}

fn chunked<T>(mut items: Vec<T>, size: usize) -> Vec<Vec<T>> {
	let size = size.max(1);
	let mut chunks = Vec::with_capacity(items.len().div_ceil(size));

	while !items.is_empty() {
		let rest = items.split_off(size.min(items.len()));
		chunks.push(std::mem::replace(&mut items, rest));
	}

	chunks
}

/// One updater per resource type, deletion modes and batch size taken from the config
pub fn updater_for(
	resource_type: ResourceType,
	config: &ReconcileConfig,
) -> Box<dyn ResourceUpdater> {
	match resource_type {
		ResourceType::Region => Box::new(Updater::<Region>::from_config(config)),
		ResourceType::Az => Box::new(Updater::<Az>::from_config(config)),
		ResourceType::Vpc => Box::new(Updater::<Vpc>::from_config(config)),
		ResourceType::Network => Box::new(Updater::<Network>::from_config(config)),
		ResourceType::Host => Box::new(Updater::<Host>::from_config(config)),
		ResourceType::Vm => Box::new(Updater::<Vm>::from_config(config)),
		ResourceType::Vrouter => Box::new(Updater::<Vrouter>::from_config(config)),
		ResourceType::Lb => Box::new(Updater::<Lb>::from_config(config)),
		ResourceType::LbVmConnection => Box::new(Updater::<LbVmConnection>::from_config(config)),
		ResourceType::PeerConnection => Box::new(Updater::<PeerConnection>::from_config(config)),
		ResourceType::PodCluster => Box::new(Updater::<PodCluster>::from_config(config)),
		ResourceType::PodService => Box::new(Updater::<PodService>::from_config(config)),
	}
}
