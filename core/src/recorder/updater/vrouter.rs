use std::collections::HashMap;

use sea_orm::ActiveValue::Set;

use crate::{
	infra::db::entities::vrouter,
	recorder::{
		cache::{diffbase::VrouterBase, DeviceOptions, DiffBaseDataSet, ToolDataSet, Unresolved},
		cloud::{self, CloudSnapshot},
		field::FieldChanges,
		DeviceType, ResourceType,
	},
};

use super::{resolve_reference, Reconcilable};

pub struct Vrouter;

impl Reconcilable for Vrouter {
	const RESOURCE_TYPE: ResourceType = ResourceType::Vrouter;

	type Cloud = cloud::Vrouter;
	type Row = vrouter::Model;
	type Active = vrouter::ActiveModel;
	type Entity = vrouter::Entity;
	type DiffBase = VrouterBase;

	fn cloud_items(snapshot: &CloudSnapshot) -> &[cloud::Vrouter] {
		&snapshot.vrouters
	}

	fn lcuuid(cloud: &cloud::Vrouter) -> &str {
		&cloud.lcuuid
	}

	fn references(cloud: &cloud::Vrouter) -> Vec<(ResourceType, &str)> {
		vec![(ResourceType::Vpc, cloud.vpc_lcuuid.as_str())]
	}

	fn diff_bases(set: &DiffBaseDataSet) -> &HashMap<String, VrouterBase> {
		&set.vrouters
	}

	fn diff_bases_mut(set: &mut DiffBaseDataSet) -> &mut HashMap<String, VrouterBase> {
		&mut set.vrouters
	}

	fn generate_to_add(
		cloud: &cloud::Vrouter,
		tool: &ToolDataSet,
	) -> Result<vrouter::ActiveModel, Unresolved> {
		let vpc_id = tool.resolve(ResourceType::Vpc, &cloud.vpc_lcuuid)?;

		Ok(vrouter::ActiveModel {
			lcuuid: Set(cloud.lcuuid.clone()),
			name: Set(cloud.name.clone()),
			label: Set(cloud.label.clone()),
			gw_launch_server: Set(cloud.gw_launch_server.clone()),
			vpc_id: Set(vpc_id),
			region: Set(cloud.region_lcuuid.clone()),
			..Default::default()
		})
	}

	fn generate_update(
		cloud: &cloud::Vrouter,
		base: &VrouterBase,
		tool: &ToolDataSet,
	) -> Result<FieldChanges, Unresolved> {
		let vpc_id = resolve_reference(tool, ResourceType::Vpc, base.vpc_id, &cloud.vpc_lcuuid)?;

		let mut changes = FieldChanges::default();
		changes
			.compare("name", &base.name, &cloud.name)
			.compare("label", &base.label, &cloud.label)
			.compare("gw_launch_server", &base.gw_launch_server, &cloud.gw_launch_server)
			.compare("vpc_id", &base.vpc_id, &vpc_id)
			.compare("region", &base.region, &cloud.region_lcuuid);

		Ok(changes)
	}

	fn index_extra(row: &vrouter::Model, tool: &mut ToolDataSet) {
		let host_id = tool.host_id_by_ip(&row.gw_launch_server);

		tool.register_device(
			DeviceType::Vrouter,
			row.id,
			DeviceOptions {
				region: row.region.clone(),
				az: String::new(),
				vpc_id: row.vpc_id,
				host_id,
				l3_device: Some((DeviceType::Vrouter, row.id)),
			},
		);
	}

	fn unindex_extra(base: &VrouterBase, tool: &mut ToolDataSet) {
		tool.unregister_device(DeviceType::Vrouter, base.id);
	}
}
