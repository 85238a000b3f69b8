use std::collections::HashMap;

use sea_orm::ActiveValue::Set;

use crate::{
	infra::db::entities::lb_vm_connection,
	recorder::{
		cache::{diffbase::LbVmConnectionBase, DiffBaseDataSet, ToolDataSet, Unresolved},
		cloud::{self, CloudSnapshot},
		field::FieldChanges,
		ResourceType,
	},
};

use super::{resolve_reference, Reconcilable};

pub struct LbVmConnection;

impl Reconcilable for LbVmConnection {
	const RESOURCE_TYPE: ResourceType = ResourceType::LbVmConnection;

	type Cloud = cloud::LbVmConnection;
	type Row = lb_vm_connection::Model;
	type Active = lb_vm_connection::ActiveModel;
	type Entity = lb_vm_connection::Entity;
	type DiffBase = LbVmConnectionBase;

	fn cloud_items(snapshot: &CloudSnapshot) -> &[cloud::LbVmConnection] {
		&snapshot.lb_vm_connections
	}

	fn lcuuid(cloud: &cloud::LbVmConnection) -> &str {
		&cloud.lcuuid
	}

	fn references(cloud: &cloud::LbVmConnection) -> Vec<(ResourceType, &str)> {
		vec![
			(ResourceType::Lb, cloud.lb_lcuuid.as_str()),
			(ResourceType::Vm, cloud.vm_lcuuid.as_str()),
		]
	}

	fn diff_bases(set: &DiffBaseDataSet) -> &HashMap<String, LbVmConnectionBase> {
		&set.lb_vm_connections
	}

	fn diff_bases_mut(set: &mut DiffBaseDataSet) -> &mut HashMap<String, LbVmConnectionBase> {
		&mut set.lb_vm_connections
	}

	fn generate_to_add(
		cloud: &cloud::LbVmConnection,
		tool: &ToolDataSet,
	) -> Result<lb_vm_connection::ActiveModel, Unresolved> {
		Ok(lb_vm_connection::ActiveModel {
			lcuuid: Set(cloud.lcuuid.clone()),
			lb_id: Set(tool.resolve(ResourceType::Lb, &cloud.lb_lcuuid)?),
			vm_id: Set(tool.resolve(ResourceType::Vm, &cloud.vm_lcuuid)?),
			..Default::default()
		})
	}

	fn generate_update(
		cloud: &cloud::LbVmConnection,
		base: &LbVmConnectionBase,
		tool: &ToolDataSet,
	) -> Result<FieldChanges, Unresolved> {
		let lb_id = resolve_reference(tool, ResourceType::Lb, base.lb_id, &cloud.lb_lcuuid)?;
		let vm_id = resolve_reference(tool, ResourceType::Vm, base.vm_id, &cloud.vm_lcuuid)?;

		let mut changes = FieldChanges::default();
		changes
			.compare("lb_id", &base.lb_id, &lb_id)
			.compare("vm_id", &base.vm_id, &vm_id);

		Ok(changes)
	}
}
