//! Leader lease entity
//!
//! A single named row holds the identity of the controller allowed to write and the instant
//! its lease runs out.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "controller_lease")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub name: String,
	pub holder: String,
	pub expires_at: DateTimeUtc,
	pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
