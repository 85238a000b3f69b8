//! Database entities
//!
//! Canonical resource tables are written by the recorder only, `ch_*` projection tables by the
//! tag recorder only.

use std::{fmt::Debug, hash::Hash};

use sea_orm::{prelude::DateTimeUtc, sea_query::Condition, EntityTrait};

pub mod az;
pub mod host;
pub mod lb;
pub mod lb_vm_connection;
pub mod network;
pub mod peer_connection;
pub mod pod_cluster;
pub mod pod_service;
pub mod region;
pub mod vm;
pub mod vpc;
pub mod vrouter;

pub mod controller_lease;
pub mod domain;
pub mod sub_domain;

pub mod ch_az;
pub mod ch_device;
pub mod ch_network;
pub mod ch_pod_cluster;
pub mod ch_region;
pub mod ch_vpc;

/// Columns every canonical resource table carries.
pub trait CanonicalEntity: EntityTrait {
	fn id_column() -> Self::Column;
	fn lcuuid_column() -> Self::Column;
	fn domain_column() -> Self::Column;
	fn sub_domain_column() -> Self::Column;
	fn created_at_column() -> Self::Column;
	fn updated_at_column() -> Self::Column;
	fn deleted_at_column() -> Self::Column;

	fn id_of(model: &Self::Model) -> i32;
	fn lcuuid_of(model: &Self::Model) -> &str;
	fn domain_of(model: &Self::Model) -> &str;
	fn sub_domain_of(model: &Self::Model) -> &str;
	fn deleted_at_of(model: &Self::Model) -> Option<DateTimeUtc>;
}

/// A denormalized projection table, addressed by its own key type.
pub trait ProjectionEntity: EntityTrait {
	type Key: Clone + Debug + Eq + Hash + Ord + Send + Sync + 'static;

	fn key_of(model: &Self::Model) -> Self::Key;
	fn key_condition(key: &Self::Key) -> Condition;
	fn conflict_columns() -> Vec<Self::Column>;

	fn name_column() -> Self::Column;
	fn icon_column() -> Self::Column;
	fn team_column() -> Self::Column;
	fn domain_column() -> Self::Column;
	fn sub_domain_column() -> Self::Column;

	/// Every column set, ready for an upsert
	fn into_active(model: Self::Model) -> Self::ActiveModel;
}

macro_rules! canonical_entity {
	() => {
		impl $crate::infra::db::entities::CanonicalEntity for Entity {
			fn id_column() -> Column {
				Column::Id
			}

			fn lcuuid_column() -> Column {
				Column::Lcuuid
			}

			fn domain_column() -> Column {
				Column::Domain
			}

			fn sub_domain_column() -> Column {
				Column::SubDomain
			}

			fn created_at_column() -> Column {
				Column::CreatedAt
			}

			fn updated_at_column() -> Column {
				Column::UpdatedAt
			}

			fn deleted_at_column() -> Column {
				Column::DeletedAt
			}

			fn id_of(model: &Model) -> i32 {
				model.id
			}

			fn lcuuid_of(model: &Model) -> &str {
				&model.lcuuid
			}

			fn domain_of(model: &Model) -> &str {
				&model.domain
			}

			fn sub_domain_of(model: &Model) -> &str {
				&model.sub_domain
			}

			fn deleted_at_of(model: &Model) -> Option<DateTimeUtc> {
				model.deleted_at
			}
		}
	};
}

pub(crate) use canonical_entity;

macro_rules! id_keyed_projection {
	() => {
		impl $crate::infra::db::entities::ProjectionEntity for Entity {
			type Key = i32;

			fn key_of(model: &Model) -> i32 {
				model.id
			}

			fn key_condition(key: &i32) -> sea_orm::sea_query::Condition {
				sea_orm::sea_query::Condition::all().add(Column::Id.eq(*key))
			}

			fn conflict_columns() -> Vec<Column> {
				vec![Column::Id]
			}

			fn name_column() -> Column {
				Column::Name
			}

			fn icon_column() -> Column {
				Column::IconId
			}

			fn team_column() -> Column {
				Column::TeamId
			}

			fn domain_column() -> Column {
				Column::DomainId
			}

			fn sub_domain_column() -> Column {
				Column::SubDomainId
			}

			fn into_active(model: Model) -> ActiveModel {
				sea_orm::ActiveModelTrait::reset_all(ActiveModel::from(model))
			}
		}
	};
}

pub(crate) use id_keyed_projection;
