//! Region tag projection

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::id_keyed_projection;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ch_region")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: i32,
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

id_keyed_projection!();
