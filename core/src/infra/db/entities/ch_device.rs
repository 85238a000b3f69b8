//! Device tag projection
//!
//! Every kind of device (hosts, VMs, routers, load balancers, clusters) shares this table,
//! keyed by device type code and the source row id.

use sea_orm::entity::prelude::*;
use sea_orm::{sea_query::Condition, ActiveModelTrait};
use serde::{Deserialize, Serialize};

use super::ProjectionEntity;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ch_device")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub devicetype: i32,
	#[sea_orm(primary_key, auto_increment = false)]
	pub deviceid: i32,
	pub name: String,
	pub uid: String,
	pub icon_id: i32,
	pub team_id: i32,
	pub domain_id: i32,
	pub sub_domain_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ProjectionEntity for Entity {
	type Key = (i32, i32);

	fn key_of(model: &Model) -> Self::Key {
		(model.devicetype, model.deviceid)
	}

	fn key_condition(key: &Self::Key) -> Condition {
		Condition::all()
			.add(Column::Devicetype.eq(key.0))
			.add(Column::Deviceid.eq(key.1))
	}

	fn conflict_columns() -> Vec<Column> {
		vec![Column::Devicetype, Column::Deviceid]
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
		ActiveModel::from(model).reset_all()
	}
}
