//! Domain registry
//!
//! Mirrors the configured domains and sub domains into the bookkeeping tables at the start of
//! every leadership term. Scopes the configuration dropped are cleaned up: their canonical
//! rows are purged, their cache partitions dropped and their removal published so projections
//! follow.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
	sea_query::OnConflict, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
	QueryFilter,
};
use strum::IntoEnumIterator;
use tracing::{info, warn};

use crate::{
	config::{DomainConfig, RecorderConfig, SubDomainConfig},
	infra::{
		db::entities::{domain, sub_domain},
		event::{DomainMessage, PubSub},
	},
};

use super::{
	cache::CacheManager, operator::StoreError, updater::updater_for, Metadata, ResourceType,
	Scope,
};

type Result<T> = std::result::Result<T, StoreError>;

pub struct DomainRegistry<'a> {
	db: &'a DatabaseConnection,
	config: &'a RecorderConfig,
}

impl<'a> DomainRegistry<'a> {
	pub fn new(db: &'a DatabaseConnection, config: &'a RecorderConfig) -> Self {
		Self { db, config }
	}

	/// Reconciles the bookkeeping tables with the configuration and returns the metadata of
	/// every configured scope, each domain followed by its sub domains.
	pub async fn sync(&self, pubsub: &PubSub, caches: &CacheManager) -> Result<Vec<Metadata>> {
		let existing_domains = domain::Entity::find()
			.all(self.db)
			.await?
			.into_iter()
			.map(|row| (row.lcuuid.clone(), row))
			.collect::<HashMap<_, _>>();

		let existing_sub_domains = sub_domain::Entity::find()
			.all(self.db)
			.await?
			.into_iter()
			.map(|row| (row.lcuuid.clone(), row))
			.collect::<HashMap<_, _>>();

		let mut configured = Vec::new();
		let mut team_changes = Vec::new();

		for domain_config in &self.config.domains {
			let domain_row = self.upsert_domain(domain_config).await?;
			let domain_metadata = Metadata {
				org_id: self.config.controller.org_id,
				team_id: domain_row.team_id,
				domain_id: domain_row.id,
				domain_lcuuid: domain_row.lcuuid.clone(),
				domain_name: domain_row.name.clone(),
				sub_domain_id: None,
				sub_domain_lcuuid: None,
			};

			configured.push(domain_metadata.clone());

			for sub_domain_config in &domain_config.sub_domains {
				let sub_domain_row = self
					.upsert_sub_domain(&domain_row.lcuuid, sub_domain_config)
					.await?;

				let metadata = Metadata {
					team_id: sub_domain_row.team_id,
					sub_domain_id: Some(sub_domain_row.id),
					sub_domain_lcuuid: Some(sub_domain_row.lcuuid.clone()),
					..domain_metadata.clone()
				};

				if let Some(previous) = existing_sub_domains.get(&sub_domain_row.lcuuid) {
					if previous.team_id != sub_domain_row.team_id {
						team_changes.push(DomainMessage::SubDomainTeamChanged {
							metadata: metadata.clone(),
							old_team_id: previous.team_id,
						});
					}
				}

				configured.push(metadata);
			}
		}

		for message in team_changes {
			info!(
				sub_domain = ?message.metadata().sub_domain_lcuuid,
				team_id = message.metadata().team_id,
				"Sub domain moved to another team"
			);
			pubsub.publish_domain(&message).await;
		}

		// Sub domains first, a removed domain takes its sub domains along anyway
		for (lcuuid, row) in &existing_sub_domains {
			let still_configured = configured
				.iter()
				.any(|metadata| metadata.sub_domain_lcuuid.as_deref() == Some(lcuuid.as_str()));
			if still_configured {
				continue;
			}

			let scope = Scope::sub_domain(row.domain.clone(), lcuuid.clone());
			self.purge(&scope).await?;
			sub_domain::Entity::delete_by_id(row.id).exec(self.db).await?;
			caches.remove(&scope).await;

			let parent = existing_domains.get(&row.domain);
			let metadata = Metadata {
				org_id: self.config.controller.org_id,
				team_id: row.team_id,
				domain_id: parent.map_or(0, |domain| domain.id),
				domain_lcuuid: row.domain.clone(),
				domain_name: parent.map(|domain| domain.name.clone()).unwrap_or_default(),
				sub_domain_id: Some(row.id),
				sub_domain_lcuuid: Some(lcuuid.clone()),
			};

			warn!(%scope, "Sub domain removed from configuration, cleaned up");
			pubsub
				.publish_domain(&DomainMessage::SubDomainDeleted(metadata))
				.await;
		}

		for (lcuuid, row) in &existing_domains {
			if self.config.domains.iter().any(|d| &d.lcuuid == lcuuid) {
				continue;
			}

			let scope = Scope::domain(lcuuid.clone());
			self.purge(&scope).await?;
			domain::Entity::delete_by_id(row.id).exec(self.db).await?;
			caches.remove_domain(lcuuid).await;

			let metadata = Metadata {
				org_id: self.config.controller.org_id,
				team_id: row.team_id,
				domain_id: row.id,
				domain_lcuuid: lcuuid.clone(),
				domain_name: row.name.clone(),
				sub_domain_id: None,
				sub_domain_lcuuid: None,
			};

			warn!(%scope, "Domain removed from configuration, cleaned up");
			pubsub
				.publish_domain(&DomainMessage::DomainDeleted(metadata))
				.await;
		}

		Ok(configured)
	}

	async fn upsert_domain(&self, config: &DomainConfig) -> Result<domain::Model> {
		let now = Utc::now();

		domain::Entity::insert(domain::ActiveModel {
			lcuuid: Set(config.lcuuid.clone()),
			name: Set(config.name.clone()),
			team_id: Set(config.team_id),
			created_at: Set(now),
			updated_at: Set(now),
			..Default::default()
		})
		.on_conflict(
			OnConflict::column(domain::Column::Lcuuid)
				.update_columns([
					domain::Column::Name,
					domain::Column::TeamId,
					domain::Column::UpdatedAt,
				])
				.to_owned(),
		)
		.exec_without_returning(self.db)
		.await?;

		domain::Entity::find()
			.filter(domain::Column::Lcuuid.eq(config.lcuuid.as_str()))
			.one(self.db)
			.await?
			.ok_or_else(|| StoreError::Db(sea_orm::DbErr::RecordNotFound(config.lcuuid.clone())))
	}

	async fn upsert_sub_domain(
		&self,
		domain_lcuuid: &str,
		config: &SubDomainConfig,
	) -> Result<sub_domain::Model> {
		let now = Utc::now();

		sub_domain::Entity::insert(sub_domain::ActiveModel {
			lcuuid: Set(config.lcuuid.clone()),
			domain: Set(domain_lcuuid.to_string()),
			name: Set(config.name.clone()),
			team_id: Set(config.team_id),
			created_at: Set(now),
			updated_at: Set(now),
			..Default::default()
		})
		.on_conflict(
			OnConflict::column(sub_domain::Column::Lcuuid)
				.update_columns([
					sub_domain::Column::Domain,
					sub_domain::Column::Name,
					sub_domain::Column::TeamId,
					sub_domain::Column::UpdatedAt,
				])
				.to_owned(),
		)
		.exec_without_returning(self.db)
		.await?;

		sub_domain::Entity::find()
			.filter(sub_domain::Column::Lcuuid.eq(config.lcuuid.as_str()))
			.one(self.db)
			.await?
			.ok_or_else(|| StoreError::Db(sea_orm::DbErr::RecordNotFound(config.lcuuid.clone())))
	}

	/// Hard deletes the canonical rows of a scope, dependents first
	async fn purge(&self, scope: &Scope) -> Result<u64> {
		let mut purged = 0;

		for resource_type in ResourceType::iter().rev() {
			purged += updater_for(resource_type, &self.config.recorder)
				.purge(self.db, scope)
				.await?;
		}

		info!(%scope, purged, "Purged canonical rows");

		Ok(purged)
	}
}
