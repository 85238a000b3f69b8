//! Generic subscriber component maintaining one projection from the event bus

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
	sea_query::{Condition, Expr, OnConflict},
	ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IdenStatic, Iterable,
	QueryFilter, QueryOrder, Value,
};
use tracing::{debug, trace};

use crate::{
	infra::{
		db::entities::{CanonicalEntity, ProjectionEntity},
		event::{
			ChangeMessage, DomainMessage, DomainSubscriber, ResourceChange, ResourceSubscriber,
			SubscriberResult,
		},
	},
	recorder::{field::FieldsUpdate, DeletionMode},
};

use super::{
	display_name,
	projection::{Projection, SourceEntity, SourceRow},
	Ownership,
};

/// Keys per delete statement
const DELETE_CHUNK: usize = 100;

pub struct SubscriberComponent<P> {
	projection: P,
	db: DatabaseConnection,
	deletion: DeletionMode,
}

impl<P: Projection> SubscriberComponent<P> {
	pub fn new(projection: P, db: DatabaseConnection, deletion: DeletionMode) -> Self {
		Self {
			projection,
			db,
			deletion,
		}
	}

	pub fn projection(&self) -> &P {
		&self.projection
	}

	pub(super) fn db(&self) -> &DatabaseConnection {
		&self.db
	}

	/// Inserts the rows, overwriting every column of rows already present
	pub(super) async fn upsert(&self, rows: Vec<P::TargetRow>) -> Result<(), DbErr> {
		if rows.is_empty() {
			return Ok(());
		}

		let keys = P::Target::conflict_columns();
		let update_columns = <P::Target as EntityTrait>::Column::iter()
			.filter(|column| !keys.iter().any(|key| key.as_str() == column.as_str()))
			.collect::<Vec<_>>();

		P::Target::insert_many(rows.into_iter().map(P::Target::into_active))
			.on_conflict(
				OnConflict::columns(keys)
					.update_columns(update_columns)
					.to_owned(),
			)
			.exec_without_returning(&self.db)
			.await?;

		Ok(())
	}

	pub(super) async fn delete_keys(
		&self,
		keys: impl IntoIterator<Item = <P::Target as ProjectionEntity>::Key>,
	) -> Result<u64, DbErr> {
		let keys = keys.into_iter().collect::<Vec<_>>();
		let mut deleted = 0;

		for chunk in keys.chunks(DELETE_CHUNK) {
			let condition = chunk
				.iter()
				.fold(Condition::any(), |condition, key| {
					condition.add(P::Target::key_condition(key))
				});

			deleted += P::Target::delete_many()
				.filter(self.projection.owned())
				.filter(condition)
				.exec(&self.db)
				.await?
				.rows_affected;
		}

		Ok(deleted)
	}

	/// Bumps `updated_at` of one source row. Readers polling the newest change of the source
	/// table otherwise miss that rows went away.
	async fn touch_source(&self) -> Result<(), DbErr> {
		let Some(row) = SourceEntity::<P>::find()
			.order_by_asc(SourceEntity::<P>::id_column())
			.one(&self.db)
			.await?
		else {
			return Ok(());
		};

		SourceEntity::<P>::update_many()
			.col_expr(SourceEntity::<P>::updated_at_column(), Expr::value(Utc::now()))
			.filter(SourceEntity::<P>::id_column().eq(SourceEntity::<P>::id_of(&row)))
			.exec(&self.db)
			.await?;

		Ok(())
	}

	async fn on_added(&self, ownership: &Ownership, rows: &[SourceRow<P>]) -> SubscriberResult {
		let targets = rows
			.iter()
			.flat_map(|row| self.projection.source_to_target(ownership, row))
			.collect::<Vec<_>>();

		trace!(projection = self.projection.name(), count = targets.len(), "Projecting added rows");

		self.upsert(targets).await?;

		Ok(())
	}

	/// Rewrites the changed columns only, creates the target rows when they're missing
	async fn on_fields_updated(
		&self,
		ownership: &Ownership,
		update: &FieldsUpdate,
		row: &SourceRow<P>,
	) -> SubscriberResult {
		let columns = self.projection.updated_columns(update, row);

		for target in self.projection.source_to_target(ownership, row) {
			let key = P::Target::key_of(&target);

			let present = if columns.is_empty() {
				P::Target::find()
					.filter(self.projection.owned())
					.filter(P::Target::key_condition(&key))
					.one(&self.db)
					.await?
					.is_some()
			} else {
				let mut statement = P::Target::update_many();
				for (column, value) in &columns {
					statement = statement.col_expr(*column, Expr::value(value.clone()));
				}

				statement
					.filter(self.projection.owned())
					.filter(P::Target::key_condition(&key))
					.exec(&self.db)
					.await?
					.rows_affected > 0
			};

			if !present {
				debug!(
					projection = self.projection.name(),
					?key,
					lcuuid = %update.lcuuid,
					"Projection row missing on update, recreating it"
				);
				self.upsert(vec![target]).await?;
			}
		}

		Ok(())
	}

	/// Soft deleted sources stay referenceable, only their display name changes
	async fn on_soft_deleted_sources(
		&self,
		ownership: &Ownership,
		rows: &[SourceRow<P>],
	) -> SubscriberResult {
		let mut targets = Vec::new();

		for row in rows {
			let name = display_name(self.projection.source_name(row), true);

			for target in self.projection.source_to_target(ownership, row) {
				let mut active = P::Target::into_active(target);
				active.set(P::Target::name_column(), Value::from(name.clone()));
				targets.push(active);
			}
		}

		if targets.is_empty() {
			return Ok(());
		}

		P::Target::insert_many(targets)
			.on_conflict(
				OnConflict::columns(P::Target::conflict_columns())
					.update_column(P::Target::name_column())
					.to_owned(),
			)
			.exec_without_returning(&self.db)
			.await?;

		Ok(())
	}

	async fn on_deleted(&self, ownership: &Ownership, rows: &[SourceRow<P>]) -> SubscriberResult {
		let keys = rows
			.iter()
			.flat_map(|row| self.projection.source_to_target(ownership, row))
			.map(|target| P::Target::key_of(&target))
			.collect::<BTreeSet<_>>();

		let deleted = self.delete_keys(keys).await?;
		trace!(projection = self.projection.name(), deleted, "Removed projection rows");

		self.touch_source().await?;

		Ok(())
	}
}

#[async_trait]
impl<P: Projection> ResourceSubscriber<SourceRow<P>> for SubscriberComponent<P> {
	fn name(&self) -> &str {
		self.projection.name()
	}

	async fn on_message(&self, message: &ChangeMessage<SourceRow<P>>) -> SubscriberResult {
		let ownership = Ownership::from(&message.metadata);

		match &message.change {
			ResourceChange::Added(rows) => self.on_added(&ownership, rows).await,
			ResourceChange::Updated { update, row } => {
				self.on_fields_updated(&ownership, update, row).await
			}
			ResourceChange::Deleted { rows, .. } => match self.deletion {
				DeletionMode::Soft => self.on_soft_deleted_sources(&ownership, rows).await,
				DeletionMode::Hard => self.on_deleted(&ownership, rows).await,
			},
		}
	}
}

#[async_trait]
impl<P: Projection> DomainSubscriber for SubscriberComponent<P> {
	fn name(&self) -> &str {
		self.projection.name()
	}

	async fn on_domain_message(&self, message: &DomainMessage) -> SubscriberResult {
		let metadata = message.metadata();

		match message {
			DomainMessage::DomainDeleted(_) => {
				let deleted = P::Target::delete_many()
					.filter(self.projection.owned())
					.filter(P::Target::domain_column().eq(metadata.domain_id))
					.exec(&self.db)
					.await?
					.rows_affected;

				debug!(projection = self.projection.name(), deleted, "Domain projection removed");
				self.touch_source().await?;
			}
			DomainMessage::SubDomainDeleted(_) => {
				let deleted = P::Target::delete_many()
					.filter(self.projection.owned())
					.filter(P::Target::sub_domain_column().eq(metadata.sub_domain_id_or_zero()))
					.exec(&self.db)
					.await?
					.rows_affected;

				debug!(
					projection = self.projection.name(),
					deleted,
					"Sub domain projection removed"
				);
				self.touch_source().await?;
			}
			DomainMessage::SubDomainTeamChanged { .. } => {
				P::Target::update_many()
					.col_expr(P::Target::team_column(), Expr::value(metadata.team_id))
					.filter(self.projection.owned())
					.filter(P::Target::sub_domain_column().eq(metadata.sub_domain_id_or_zero()))
					.exec(&self.db)
					.await?;
			}
		}

		Ok(())
	}
}
