use std::collections::HashMap;

use sea_orm::ActiveValue::Set;

use crate::{
	infra::db::entities::region,
	recorder::{
		cache::{diffbase::RegionBase, DiffBaseDataSet, ToolDataSet, Unresolved},
		cloud::{self, CloudSnapshot},
		field::FieldChanges,
		ResourceType,
	},
};

use super::Reconcilable;

pub struct Region;

impl Reconcilable for Region {
	const RESOURCE_TYPE: ResourceType = ResourceType::Region;

	type Cloud = cloud::Region;
	type Row = region::Model;
	type Active = region::ActiveModel;
	type Entity = region::Entity;
	type DiffBase = RegionBase;

	fn cloud_items(snapshot: &CloudSnapshot) -> &[cloud::Region] {
		&snapshot.regions
	}

	fn lcuuid(cloud: &cloud::Region) -> &str {
		&cloud.lcuuid
	}

	fn diff_bases(set: &DiffBaseDataSet) -> &HashMap<String, RegionBase> {
		&set.regions
	}

	fn diff_bases_mut(set: &mut DiffBaseDataSet) -> &mut HashMap<String, RegionBase> {
		&mut set.regions
	}

	fn generate_to_add(
		cloud: &cloud::Region,
		_: &ToolDataSet,
	) -> Result<region::ActiveModel, Unresolved> {
		Ok(region::ActiveModel {
			lcuuid: Set(cloud.lcuuid.clone()),
			name: Set(cloud.name.clone()),
			label: Set(cloud.label.clone()),
			..Default::default()
		})
	}

	fn generate_update(
		cloud: &cloud::Region,
		base: &RegionBase,
		_: &ToolDataSet,
	) -> Result<FieldChanges, Unresolved> {
		let mut changes = FieldChanges::default();
		changes
			.compare("name", &base.name, &cloud.name)
			.compare("label", &base.label, &cloud.label);

		Ok(changes)
	}
}
