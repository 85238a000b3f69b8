//! Lease row leadership
//!
//! Every controller probes the same `controller_lease` row. The holder renews it on each probe,
//! anybody else can only take it over once it expired.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
	sea_query::{Condition, Expr, OnConflict},
	ActiveValue::Set,
	ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use tracing::{debug, trace};

use crate::infra::db::entities::controller_lease;

use super::{LeadershipProvider, Result};

const DEFAULT_LEASE_NAME: &str = "recorder";

pub struct LeaseLeadership {
	db: DatabaseConnection,
	node_id: String,
	name: String,
	ttl: chrono::Duration,
}

impl LeaseLeadership {
	pub fn new(db: DatabaseConnection, node_id: impl Into<String>, ttl: Duration) -> Self {
		Self {
			db,
			node_id: node_id.into(),
			name: DEFAULT_LEASE_NAME.to_string(),
			ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(90)),
		}
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	pub fn node_id(&self) -> &str {
		&self.node_id
	}
}

#[async_trait]
impl LeadershipProvider for LeaseLeadership {
	async fn is_leader(&self) -> Result<(bool, String)> {
		let now = Utc::now();
		let expires_at = now + self.ttl;

		// First probe ever on this store
		controller_lease::Entity::insert(controller_lease::ActiveModel {
			name: Set(self.name.clone()),
			holder: Set(self.node_id.clone()),
			expires_at: Set(expires_at),
			updated_at: Set(now),
		})
		.on_conflict(
			OnConflict::column(controller_lease::Column::Name)
				.do_nothing()
				.to_owned(),
		)
		.exec_without_returning(&self.db)
		.await?;

		let renewed = controller_lease::Entity::update_many()
			.col_expr(controller_lease::Column::Holder, Expr::value(self.node_id.clone()))
			.col_expr(controller_lease::Column::ExpiresAt, Expr::value(expires_at))
			.col_expr(controller_lease::Column::UpdatedAt, Expr::value(now))
			.filter(controller_lease::Column::Name.eq(self.name.as_str()))
			.filter(
				Condition::any()
					.add(controller_lease::Column::Holder.eq(self.node_id.as_str()))
					.add(controller_lease::Column::ExpiresAt.lt(now)),
			)
			.exec(&self.db)
			.await?
			.rows_affected;

		trace!(lease = %self.name, renewed, "Lease probed");

		let holder = controller_lease::Entity::find_by_id(self.name.clone())
			.one(&self.db)
			.await?
			.map(|lease| lease.holder)
			.unwrap_or_default();

		Ok((holder == self.node_id, holder))
	}

	async fn release(&self) -> Result<()> {
		let released = controller_lease::Entity::update_many()
			.col_expr(controller_lease::Column::ExpiresAt, Expr::value(Utc::now()))
			.filter(controller_lease::Column::Name.eq(self.name.as_str()))
			.filter(controller_lease::Column::Holder.eq(self.node_id.as_str()))
			.exec(&self.db)
			.await?
			.rows_affected;

		debug!(lease = %self.name, released = released > 0, "Lease released");

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::infra::db::Database;

	async fn store() -> DatabaseConnection {
		let db = Database::memory().await.unwrap();
		db.migrate().await.unwrap();
		db.conn().clone()
	}

	#[tokio::test]
	async fn test_lease_is_exclusive() {
		let db = store().await;
		let a = LeaseLeadership::new(db.clone(), "a", Duration::from_secs(60));
		let b = LeaseLeadership::new(db.clone(), "b", Duration::from_secs(60));

		assert_eq!(a.is_leader().await.unwrap(), (true, "a".to_string()));
		assert_eq!(b.is_leader().await.unwrap(), (false, "a".to_string()));

		// Renewal keeps the holder
		assert_eq!(a.is_leader().await.unwrap(), (true, "a".to_string()));
		assert_eq!(b.is_leader().await.unwrap(), (false, "a".to_string()));
	}

	#[tokio::test]
	async fn test_released_lease_is_taken_over() {
		let db = store().await;
		let a = LeaseLeadership::new(db.clone(), "a", Duration::from_secs(60));
		let b = LeaseLeadership::new(db.clone(), "b", Duration::from_secs(60));

		assert!(a.is_leader().await.unwrap().0);
		a.release().await.unwrap();

		tokio::time::sleep(Duration::from_millis(5)).await;

		assert_eq!(b.is_leader().await.unwrap(), (true, "b".to_string()));
		assert_eq!(a.is_leader().await.unwrap(), (false, "b".to_string()));
	}

	#[tokio::test]
	async fn test_expired_lease_is_taken_over() {
		let db = store().await;
		let a = LeaseLeadership::new(db.clone(), "a", Duration::ZERO);
		let b = LeaseLeadership::new(db.clone(), "b", Duration::from_secs(60));

		assert!(a.is_leader().await.unwrap().0);
		tokio::time::sleep(Duration::from_millis(5)).await;

		assert!(b.is_leader().await.unwrap().0);
	}

	#[tokio::test]
	async fn test_leases_are_independent_by_name() {
		let db = store().await;
		let a = LeaseLeadership::new(db.clone(), "a", Duration::from_secs(60));
		let b = LeaseLeadership::new(db, "b", Duration::from_secs(60)).with_name("other");

		assert!(a.is_leader().await.unwrap().0);
		assert!(b.is_leader().await.unwrap().0);
	}
}
