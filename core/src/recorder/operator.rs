//! Canonical store operator
//!
//! The only writer of canonical rows. Every call is scoped to one domain (and sub domain) and
//! runs in a single transaction, so a failed batch leaves nothing behind. Inserts are upserts
//! keyed by lcuuid: retrying a batch is harmless, and a soft deleted row that comes back keeps
//! its surrogate id. A live row owned by another scope is never taken over.

use std::{marker::PhantomData, str::FromStr};

use chrono::Utc;
use sea_orm::{
	sea_query::{Condition, Expr, OnConflict},
	ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityName, EntityTrait,
	FromQueryResult, IdenStatic, IntoActiveModel, Iterable, QueryFilter, TransactionTrait, Value,
};
use thiserror::Error;
use tracing::debug;

use crate::infra::db::entities::{self, CanonicalEntity};

use super::{field::FieldsUpdate, DeletionMode, ResourceType, Scope};

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("Database error: {0}")]
	Db(#[from] DbErr),

	#[error("Unknown column {field} on {table}")]
	UnknownColumn { table: String, field: &'static str },
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub struct Operator<'a, E> {
	db: &'a DatabaseConnection,
	scope: &'a Scope,
	_marker: PhantomData<fn() -> E>,
}

impl<'a, E> Operator<'a, E>
where
	E: CanonicalEntity,
	E::Model: IntoActiveModel<E::ActiveModel> + FromQueryResult + Send + Sync,
	E::ActiveModel: Send + Sync,
{
	pub fn new(db: &'a DatabaseConnection, scope: &'a Scope) -> Self {
		Self {
			db,
			scope,
			_marker: PhantomData,
		}
	}

	/// Upserts the batch and reads back the rows now live in this scope. Items whose lcuuid
	/// belongs to a live row of another scope are left out of the result.
	pub async fn insert(&self, items: Vec<(String, E::ActiveModel)>) -> Result<Vec<E::Model>> {
		if items.is_empty() {
			return Ok(vec![]);
		}

		let now = Utc::now();
		let mut lcuuids = Vec::with_capacity(items.len());
		let mut models = Vec::with_capacity(items.len());

		for (lcuuid, mut model) in items {
			model.set(E::domain_column(), self.scope.domain.clone().into());
			model.set(
				E::sub_domain_column(),
				self.scope.sub_domain_column().to_string().into(),
			);
			model.set(E::created_at_column(), now.into());
			model.set(E::updated_at_column(), now.into());
			model.set(E::deleted_at_column(), Value::ChronoDateTimeUtc(None));

			lcuuids.push(lcuuid);
			models.push(model);
		}

		// Everything but the surrogate id and creation time is refreshed on conflict
		let update_columns = E::Column::iter()
			.filter(|column| {
				column.as_str() != E::id_column().as_str()
					&& column.as_str() != E::created_at_column().as_str()
			})
			.collect::<Vec<_>>();

		// A conflicting row is overwritten only when it is ours or soft deleted
		let takeover = Condition::any()
			.add(self.in_scope())
			.add(E::deleted_at_column().is_not_null());

		let txn = self.db.begin().await?;

		E::insert_many(models)
			.on_conflict(
				OnConflict::column(E::lcuuid_column())
					.update_columns(update_columns)
					.action_cond_where(takeover)
					.to_owned(),
			)
			.exec_without_returning(&txn)
			.await?;

		let rows = E::find()
			.filter(E::lcuuid_column().is_in(lcuuids))
			.filter(self.in_scope())
			.filter(E::deleted_at_column().is_null())
			.all(&txn)
			.await?;

		txn.commit().await?;

		debug!(
			table = E::default().table_name(),
			scope = %self.scope,
			count = rows.len(),
			"Inserted rows"
		);

		Ok(rows)
	}

	/// Applies every update of the batch and reads the updated rows back. A row that no longer
	/// exists in this scope is missing from the result.
	pub async fn update(&self, updates: &[FieldsUpdate]) -> Result<Vec<E::Model>> {
		if updates.is_empty() {
			return Ok(vec![]);
		}

		let now = Utc::now();
		let mut touched = Vec::with_capacity(updates.len());
		let txn = self.db.begin().await?;

		for update in updates {
			let mut statement = E::update_many()
				.col_expr(E::updated_at_column(), Expr::value(now));

			for change in update.changes.iter() {
				let column =
					E::Column::from_str(change.field).map_err(|_| StoreError::UnknownColumn {
						table: E::default().table_name().to_string(),
						field: change.field,
					})?;

				statement = statement.col_expr(column, Expr::value(Value::from(change.new.clone())));
			}

			let affected = statement
				.filter(E::id_column().eq(update.id))
				.filter(self.in_scope())
				.filter(E::deleted_at_column().is_null())
				.exec(&txn)
				.await?
				.rows_affected;

			if affected > 0 {
				touched.push(update.id);
			}
		}

		let rows = if touched.is_empty() {
			vec![]
		} else {
			E::find()
				.filter(E::id_column().is_in(touched))
				.all(&txn)
				.await?
		};

		txn.commit().await?;

		Ok(rows)
	}

	/// Removes or flags the live rows of this scope, returning them as they were before the
	/// call. Lcuuids without such a row are missing from the result.
	pub async fn delete(&self, mode: DeletionMode, lcuuids: &[String]) -> Result<Vec<E::Model>> {
		if lcuuids.is_empty() {
			return Ok(vec![]);
		}

		let txn = self.db.begin().await?;

		let rows = E::find()
			.filter(E::lcuuid_column().is_in(lcuuids.iter().cloned()))
			.filter(self.in_scope())
			.filter(E::deleted_at_column().is_null())
			.all(&txn)
			.await?;

		match mode {
			DeletionMode::Soft => {
				E::update_many()
					.col_expr(E::deleted_at_column(), Expr::value(Utc::now()))
					.filter(E::deleted_at_column().is_null())
					.filter(E::lcuuid_column().is_in(lcuuids.iter().cloned()))
					.filter(self.in_scope())
					.exec(&txn)
					.await?;
			}
			DeletionMode::Hard => {
				E::delete_many()
					.filter(E::lcuuid_column().is_in(lcuuids.iter().cloned()))
					.filter(self.in_scope())
					.exec(&txn)
					.await?;
			}
		}

		txn.commit().await?;

		Ok(rows)
	}

	/// Live rows of the scope, used to rebuild the cache
	pub async fn load(&self) -> Result<Vec<E::Model>> {
		Ok(E::find()
			.filter(self.in_scope())
			.filter(E::deleted_at_column().is_null())
			.all(self.db)
			.await?)
	}

	fn in_scope(&self) -> Condition {
		Condition::all()
			.add(E::domain_column().eq(self.scope.domain.as_str()))
			.add(E::sub_domain_column().eq(self.scope.sub_domain_column()))
	}

	/// Hard deletes every row of the scope, soft deleted ones included. A domain scope purges
	/// the rows of its sub domains as well.
	pub async fn purge(&self) -> Result<u64> {
		let mut statement =
			E::delete_many().filter(E::domain_column().eq(self.scope.domain.as_str()));

		if let Some(sub_domain) = &self.scope.sub_domain {
			statement = statement.filter(E::sub_domain_column().eq(sub_domain.as_str()));
		}

		Ok(statement.exec(self.db).await?.rows_affected)
	}
}

/// Surrogate id of a live row with this lcuuid in any scope
pub async fn find_live_id<E>(db: &DatabaseConnection, lcuuid: &str) -> Result<Option<i32>>
where
	E: CanonicalEntity,
	E::Model: FromQueryResult + Send + Sync,
{
	Ok(E::find()
		.filter(E::lcuuid_column().eq(lcuuid))
		.filter(E::deleted_at_column().is_null())
		.one(db)
		.await?
		.map(|row| E::id_of(&row)))
}

/// Store round trip behind a cold tool index entry
pub async fn lookup_live_id(
	db: &DatabaseConnection,
	resource_type: ResourceType,
	lcuuid: &str,
) -> Result<Option<i32>> {
	use entities::*;

	match resource_type {
		ResourceType::Region => find_live_id::<region::Entity>(db, lcuuid).await,
		ResourceType::Az => find_live_id::<az::Entity>(db, lcuuid).await,
		ResourceType::Vpc => find_live_id::<vpc::Entity>(db, lcuuid).await,
		ResourceType::Network => find_live_id::<network::Entity>(db, lcuuid).await,
		ResourceType::Host => find_live_id::<host::Entity>(db, lcuuid).await,
		ResourceType::Vm => find_live_id::<vm::Entity>(db, lcuuid).await,
		ResourceType::Vrouter => find_live_id::<vrouter::Entity>(db, lcuuid).await,
		ResourceType::Lb => find_live_id::<lb::Entity>(db, lcuuid).await,
		ResourceType::LbVmConnection => {
			find_live_id::<lb_vm_connection::Entity>(db, lcuuid).await
		}
		ResourceType::PeerConnection => {
			find_live_id::<peer_connection::Entity>(db, lcuuid).await
		}
		ResourceType::PodCluster => find_live_id::<pod_cluster::Entity>(db, lcuuid).await,
		ResourceType::PodService => find_live_id::<pod_service::Entity>(db, lcuuid).await,
	}
}
