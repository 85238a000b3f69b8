use std::collections::HashMap;

use sea_orm::ActiveValue::Set;

use crate::{
	infra::db::entities::lb,
	recorder::{
		cache::{diffbase::LbBase, DeviceOptions, DiffBaseDataSet, ToolDataSet, Unresolved},
		cloud::{self, CloudSnapshot},
		field::FieldChanges,
		DeviceType, ResourceType,
	},
};

use super::{resolve_reference, Reconcilable};

pub struct Lb;

impl Reconcilable for Lb {
	const RESOURCE_TYPE: ResourceType = ResourceType::Lb;

	type Cloud = cloud::Lb;
	type Row = lb::Model;
	type Active = lb::ActiveModel;
	type Entity = lb::Entity;
	type DiffBase = LbBase;

	fn cloud_items(snapshot: &CloudSnapshot) -> &[cloud::Lb] {
		&snapshot.lbs
	}

	fn lcuuid(cloud: &cloud::Lb) -> &str {
		&cloud.lcuuid
	}

	fn references(cloud: &cloud::Lb) -> Vec<(ResourceType, &str)> {
		vec![(ResourceType::Vpc, cloud.vpc_lcuuid.as_str())]
	}

	fn diff_bases(set: &DiffBaseDataSet) -> &HashMap<String, LbBase> {
		&set.lbs
	}

	fn diff_bases_mut(set: &mut DiffBaseDataSet) -> &mut HashMap<String, LbBase> {
		&mut set.lbs
	}

	fn generate_to_add(cloud: &cloud::Lb, tool: &ToolDataSet) -> Result<lb::ActiveModel, Unresolved> {
		let vpc_id = tool.resolve(ResourceType::Vpc, &cloud.vpc_lcuuid)?;

		Ok(lb::ActiveModel {
			lcuuid: Set(cloud.lcuuid.clone()),
			name: Set(cloud.name.clone()),
			label: Set(cloud.label.clone()),
			model: Set(cloud.model),
			vip: Set(cloud.vip.clone()),
			vpc_id: Set(vpc_id),
			region: Set(cloud.region_lcuuid.clone()),
			..Default::default()
		})
	}

	fn generate_update(
		cloud: &cloud::Lb,
		base: &LbBase,
		tool: &ToolDataSet,
	) -> Result<FieldChanges, Unresolved> {
		let vpc_id = resolve_reference(tool, ResourceType::Vpc, base.vpc_id, &cloud.vpc_lcuuid)?;

		let mut changes = FieldChanges::default();
		changes
			.compare("name", &base.name, &cloud.name)
			.compare("label", &base.label, &cloud.label)
			.compare("model", &base.model, &cloud.model)
			.compare("vip", &base.vip, &cloud.vip)
			.compare("vpc_id", &base.vpc_id, &vpc_id)
			.compare("region", &base.region, &cloud.region_lcuuid);

		Ok(changes)
	}

	fn index_extra(row: &lb::Model, tool: &mut ToolDataSet) {
		tool.register_device(
			DeviceType::Lb,
			row.id,
			DeviceOptions {
				region: row.region.clone(),
				az: String::new(),
				vpc_id: row.vpc_id,
				host_id: None,
				l3_device: Some((DeviceType::Lb, row.id)),
			},
		);
	}

	fn unindex_extra(base: &LbBase, tool: &mut ToolDataSet) {
		tool.unregister_device(DeviceType::Lb, base.id);
	}
}
