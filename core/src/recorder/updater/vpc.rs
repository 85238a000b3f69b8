use std::collections::HashMap;

use sea_orm::ActiveValue::Set;

use crate::{
	infra::db::entities::vpc,
	recorder::{
		cache::{diffbase::VpcBase, DiffBaseDataSet, ToolDataSet, Unresolved},
		cloud::{self, CloudSnapshot},
		field::FieldChanges,
		ResourceType,
	},
};

use super::Reconcilable;

pub struct Vpc;

impl Reconcilable for Vpc {
	const RESOURCE_TYPE: ResourceType = ResourceType::Vpc;

	type Cloud = cloud::Vpc;
	type Row = vpc::Model;
	type Active = vpc::ActiveModel;
	type Entity = vpc::Entity;
	type DiffBase = VpcBase;

	fn cloud_items(snapshot: &CloudSnapshot) -> &[cloud::Vpc] {
		&snapshot.vpcs
	}

	fn lcuuid(cloud: &cloud::Vpc) -> &str {
		&cloud.lcuuid
	}

	fn diff_bases(set: &DiffBaseDataSet) -> &HashMap<String, VpcBase> {
		&set.vpcs
	}

	fn diff_bases_mut(set: &mut DiffBaseDataSet) -> &mut HashMap<String, VpcBase> {
		&mut set.vpcs
	}

	fn generate_to_add(cloud: &cloud::Vpc, _: &ToolDataSet) -> Result<vpc::ActiveModel, Unresolved> {
		Ok(vpc::ActiveModel {
			lcuuid: Set(cloud.lcuuid.clone()),
			name: Set(cloud.name.clone()),
			label: Set(cloud.label.clone()),
			cidr: Set(cloud.cidr.clone()),
			region: Set(cloud.region_lcuuid.clone()),
			..Default::default()
		})
	}

	fn generate_update(
		cloud: &cloud::Vpc,
		base: &VpcBase,
		_: &ToolDataSet,
	) -> Result<FieldChanges, Unresolved> {
		let mut changes = FieldChanges::default();
		changes
			.compare("name", &base.name, &cloud.name)
			.compare("label", &base.label, &cloud.label)
			.compare("cidr", &base.cidr, &cloud.cidr)
			.compare("region", &base.region, &cloud.region_lcuuid);

		Ok(changes)
	}
}
