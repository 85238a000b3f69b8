//! Canonical store access using SeaORM

use std::time::Duration;

use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::config::DatabaseConfig;

pub mod entities;
pub mod migration;

/// Database wrapper shared by every pipeline component
pub struct Database {
	conn: DatabaseConnection,
}

impl Database {
	pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbErr> {
		let mut opt = ConnectOptions::new(config.url.clone());
		opt.max_connections(config.max_connections)
			.min_connections(1)
			.connect_timeout(Duration::from_secs(8))
			.sqlx_logging(false); // We'll use tracing instead

		let conn = SeaDatabase::connect(opt).await?;

		info!(url = %config.url, "Connected to canonical store");

		Ok(Self { conn })
	}

	/// Private in-memory store, a single pooled connection keeps it alive
	pub async fn memory() -> Result<Self, DbErr> {
		Self::connect(&DatabaseConfig {
			url: "sqlite::memory:".to_string(),
			max_connections: 1,
		})
		.await
	}

	/// Brings the schema up to date, idempotent
	pub async fn migrate(&self) -> Result<(), DbErr> {
		migration::Migrator::up(&self.conn, None).await?;
		info!("Database migrations completed successfully");
		Ok(())
	}

	pub fn conn(&self) -> &DatabaseConnection {
		&self.conn
	}
}
