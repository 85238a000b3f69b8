use std::collections::HashMap;

use sea_orm::ActiveValue::Set;

use crate::{
	infra::db::entities::az,
	recorder::{
		cache::{diffbase::AzBase, DiffBaseDataSet, ToolDataSet, Unresolved},
		cloud::{self, CloudSnapshot},
		field::FieldChanges,
		ResourceType,
	},
};

use super::Reconcilable;

pub struct Az;

impl Reconcilable for Az {
	const RESOURCE_TYPE: ResourceType = ResourceType::Az;

	type Cloud = cloud::Az;
	type Row = az::Model;
	type Active = az::ActiveModel;
	type Entity = az::Entity;
	type DiffBase = AzBase;

	fn cloud_items(snapshot: &CloudSnapshot) -> &[cloud::Az] {
		&snapshot.azs
	}

	fn lcuuid(cloud: &cloud::Az) -> &str {
		&cloud.lcuuid
	}

	fn diff_bases(set: &DiffBaseDataSet) -> &HashMap<String, AzBase> {
		&set.azs
	}

	fn diff_bases_mut(set: &mut DiffBaseDataSet) -> &mut HashMap<String, AzBase> {
		&mut set.azs
	}

	fn generate_to_add(cloud: &cloud::Az, _: &ToolDataSet) -> Result<az::ActiveModel, Unresolved> {
		Ok(az::ActiveModel {
			lcuuid: Set(cloud.lcuuid.clone()),
			name: Set(cloud.name.clone()),
			label: Set(cloud.label.clone()),
			region: Set(cloud.region_lcuuid.clone()),
			..Default::default()
		})
	}

	fn generate_update(
		cloud: &cloud::Az,
		base: &AzBase,
		_: &ToolDataSet,
	) -> Result<FieldChanges, Unresolved> {
		let mut changes = FieldChanges::default();
		changes
			.compare("name", &base.name, &cloud.name)
			.compare("label", &base.label, &cloud.label)
			.compare("region", &base.region, &cloud.region_lcuuid);

		Ok(changes)
	}
}
