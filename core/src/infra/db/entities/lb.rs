//! Load balancer entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::canonical_entity;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lb")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub id: i32,
	#[sea_orm(unique)]
	pub lcuuid: String,
	pub name: String,
	pub label: String,
	pub model: i32,
	pub vip: String,
	pub vpc_id: i32,
	pub region: String,
	pub domain: String,
	pub sub_domain: String,
	pub created_at: DateTimeUtc,
	pub updated_at: DateTimeUtc,
	pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

canonical_entity!();
