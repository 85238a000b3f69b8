use std::collections::HashMap;

use sea_orm::ActiveValue::Set;

use crate::{
	infra::db::entities::vm,
	recorder::{
		cache::{diffbase::VmBase, DeviceOptions, DiffBaseDataSet, ToolDataSet, Unresolved},
		cloud::{self, CloudSnapshot},
		field::FieldChanges,
		DeviceType, ResourceType,
	},
};

use super::{resolve_reference, Reconcilable};

pub struct Vm;

impl Reconcilable for Vm {
	const RESOURCE_TYPE: ResourceType = ResourceType::Vm;

	type Cloud = cloud::Vm;
	type Row = vm::Model;
	type Active = vm::ActiveModel;
	type Entity = vm::Entity;
	type DiffBase = VmBase;

	fn cloud_items(snapshot: &CloudSnapshot) -> &[cloud::Vm] {
		&snapshot.vms
	}

	fn lcuuid(cloud: &cloud::Vm) -> &str {
		&cloud.lcuuid
	}

	fn references(cloud: &cloud::Vm) -> Vec<(ResourceType, &str)> {
		vec![(ResourceType::Vpc, cloud.vpc_lcuuid.as_str())]
	}

	fn diff_bases(set: &DiffBaseDataSet) -> &HashMap<String, VmBase> {
		&set.vms
	}

	fn diff_bases_mut(set: &mut DiffBaseDataSet) -> &mut HashMap<String, VmBase> {
		&mut set.vms
	}

	fn generate_to_add(cloud: &cloud::Vm, tool: &ToolDataSet) -> Result<vm::ActiveModel, Unresolved> {
		let vpc_id = tool.resolve(ResourceType::Vpc, &cloud.vpc_lcuuid)?;

		Ok(vm::ActiveModel {
			lcuuid: Set(cloud.lcuuid.clone()),
			name: Set(cloud.name.clone()),
			label: Set(cloud.label.clone()),
			htype: Set(cloud.htype),
			state: Set(cloud.state),
			launch_server: Set(cloud.launch_server.clone()),
			vpc_id: Set(vpc_id),
			az: Set(cloud.az_lcuuid.clone()),
			region: Set(cloud.region_lcuuid.clone()),
			..Default::default()
		})
	}

	fn generate_update(
		cloud: &cloud::Vm,
		base: &VmBase,
		tool: &ToolDataSet,
	) -> Result<FieldChanges, Unresolved> {
		let vpc_id = resolve_reference(tool, ResourceType::Vpc, base.vpc_id, &cloud.vpc_lcuuid)?;

		let mut changes = FieldChanges::default();
		changes
			.compare("name", &base.name, &cloud.name)
			.compare("label", &base.label, &cloud.label)
			.compare("htype", &base.htype, &cloud.htype)
			.compare("state", &base.state, &cloud.state)
			.compare("launch_server", &base.launch_server, &cloud.launch_server)
			.compare("vpc_id", &base.vpc_id, &vpc_id)
			.compare("az", &base.az, &cloud.az_lcuuid)
			.compare("region", &base.region, &cloud.region_lcuuid);

		Ok(changes)
	}

	fn index_extra(row: &vm::Model, tool: &mut ToolDataSet) {
		let host_id = tool.host_id_by_ip(&row.launch_server);

		tool.register_device(
			DeviceType::Vm,
			row.id,
			DeviceOptions {
				region: row.region.clone(),
				az: row.az.clone(),
				vpc_id: row.vpc_id,
				host_id,
				l3_device: Some((DeviceType::Vm, row.id)),
			},
		);
	}

	fn unindex_extra(base: &VmBase, tool: &mut ToolDataSet) {
		tool.unregister_device(DeviceType::Vm, base.id);
	}
}
