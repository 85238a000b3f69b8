//! Full projection consistency check
//!
//! Events can be lost: a subscriber failure is only logged and a controller may crash between
//! a commit and its publish. The check recomputes every projection from the canonical rows and
//! repairs the difference.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use tracing::{error, info, instrument};

use crate::{
	infra::db::entities::{domain, sub_domain, CanonicalEntity, ProjectionEntity},
};

use super::{
	projection::{Projection, SourceEntity, SourceRow},
	subscriber::SubscriberComponent,
	Ownership,
};

/// Ownership of every known scope, keyed by lcuuid
#[derive(Debug, Clone, Default)]
pub struct OwnershipIndex {
	domains: HashMap<String, Ownership>,
	sub_domains: HashMap<String, (String, Ownership)>,
}

impl OwnershipIndex {
	pub async fn load(db: &DatabaseConnection) -> Result<Self, DbErr> {
		let domains = domain::Entity::find()
			.all(db)
			.await?
			.into_iter()
			.map(|row| {
				(
					row.lcuuid,
					Ownership {
						team_id: row.team_id,
						domain_id: row.id,
						sub_domain_id: 0,
					},
				)
			})
			.collect::<HashMap<_, _>>();

		let sub_domains = sub_domain::Entity::find()
			.all(db)
			.await?
			.into_iter()
			.filter_map(|row| {
				let parent = domains.get(&row.domain)?;
				let ownership = Ownership {
					team_id: row.team_id,
					domain_id: parent.domain_id,
					sub_domain_id: row.id,
				};
				Some((row.lcuuid, (row.domain, ownership)))
			})
			.collect();

		Ok(Self {
			domains,
			sub_domains,
		})
	}

	/// Rows of an unknown scope, or of a sub domain listed under another domain, resolve to
	/// nothing
	pub fn resolve(&self, domain: &str, sub_domain: &str) -> Option<Ownership> {
		if sub_domain.is_empty() {
			return self.domains.get(domain).copied();
		}

		self.sub_domains
			.get(sub_domain)
			.filter(|(parent, _)| parent == domain)
			.map(|(_, ownership)| *ownership)
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckReport {
	pub added: usize,
	pub updated: usize,
	pub deleted: u64,
}

impl CheckReport {
	pub fn is_clean(&self) -> bool {
		self.added == 0 && self.updated == 0 && self.deleted == 0
	}
}

#[async_trait]
pub trait ProjectionCheck: Send + Sync {
	fn name(&self) -> &str;

	async fn check(&self, index: &OwnershipIndex) -> Result<CheckReport, DbErr>;
}

#[async_trait]
impl<P: Projection> ProjectionCheck for SubscriberComponent<P> {
	fn name(&self) -> &str {
		self.projection().name()
	}

	async fn check(&self, index: &OwnershipIndex) -> Result<CheckReport, DbErr> {
		let projection = self.projection();
		let sources: Vec<SourceRow<P>> = SourceEntity::<P>::find().all(self.db()).await?;

		let mut expected = HashMap::new();
		for row in &sources {
			let domain = SourceEntity::<P>::domain_of(row);
			let sub_domain = SourceEntity::<P>::sub_domain_of(row);

			let Some(ownership) = index.resolve(domain, sub_domain) else {
				continue;
			};

			for target in projection.source_to_target(&ownership, row) {
				expected.insert(P::Target::key_of(&target), target);
			}
		}

		let existing = P::Target::find()
			.filter(projection.owned())
			.all(self.db())
			.await?
			.into_iter()
			.map(|row| (P::Target::key_of(&row), row))
			.collect::<HashMap<_, _>>();

		let mut report = CheckReport::default();
		let mut repairs = Vec::new();

		for (key, target) in expected.iter() {
			match existing.get(key) {
				None => {
					report.added += 1;
					repairs.push(target.clone());
				}
				Some(row) if row != target => {
					report.updated += 1;
					repairs.push(target.clone());
				}
				Some(_) => {}
			}
		}

		let extras = existing
			.into_keys()
			.filter(|key| !expected.contains_key(key))
			.collect::<Vec<_>>();

		self.upsert(repairs).await?;
		report.deleted = self.delete_keys(extras).await?;

		Ok(report)
	}
}

/// Runs every check, a failing projection doesn't keep the others from being repaired
#[instrument(skip_all)]
pub async fn run_checks(
	db: &DatabaseConnection,
	checks: &[Arc<dyn ProjectionCheck>],
) -> Result<(), DbErr> {
	let index = OwnershipIndex::load(db).await?;

	for check in checks {
		match check.check(&index).await {
			Ok(report) if report.is_clean() => {}
			Ok(report) => info!(
				projection = check.name(),
				added = report.added,
				updated = report.updated,
				deleted = report.deleted,
				"Projection repaired"
			),
			Err(e) => error!(projection = check.name(), ?e, "Projection check failed"),
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn index() -> OwnershipIndex {
		let mut index = OwnershipIndex::default();
		index.domains.insert(
			"d-1".into(),
			Ownership {
				team_id: 1,
				domain_id: 10,
				sub_domain_id: 0,
			},
		);
		index.sub_domains.insert(
			"sd-1".into(),
			(
				"d-1".into(),
				Ownership {
					team_id: 4,
					domain_id: 10,
					sub_domain_id: 20,
				},
			),
		);
		index
	}

	#[test]
	fn test_resolve_ownership() {
		let index = index();

		assert_eq!(index.resolve("d-1", "").map(|o| o.domain_id), Some(10));
		assert_eq!(index.resolve("d-1", "sd-1").map(|o| o.team_id), Some(4));
		assert_eq!(index.resolve("d-2", "sd-1"), None);
		assert_eq!(index.resolve("d-2", ""), None);
		assert_eq!(index.resolve("d-1", "sd-9"), None);
	}
}
