//! Hosts also feed the IP lookup VMs use to find the host they run on.

use std::collections::HashMap;

use sea_orm::ActiveValue::Set;

use crate::{
	infra::db::entities::host,
	recorder::{
		cache::{diffbase::HostBase, DeviceOptions, DiffBaseDataSet, ToolDataSet, Unresolved},
		cloud::{self, CloudSnapshot},
		field::FieldChanges,
		DeviceType, ResourceType,
	},
};

use super::Reconcilable;

pub struct Host;

impl Reconcilable for Host {
	const RESOURCE_TYPE: ResourceType = ResourceType::Host;

	type Cloud = cloud::Host;
	type Row = host::Model;
	type Active = host::ActiveModel;
	type Entity = host::Entity;
	type DiffBase = HostBase;

	fn cloud_items(snapshot: &CloudSnapshot) -> &[cloud::Host] {
		&snapshot.hosts
	}

	fn lcuuid(cloud: &cloud::Host) -> &str {
		&cloud.lcuuid
	}

	fn diff_bases(set: &DiffBaseDataSet) -> &HashMap<String, HostBase> {
		&set.hosts
	}

	fn diff_bases_mut(set: &mut DiffBaseDataSet) -> &mut HashMap<String, HostBase> {
		&mut set.hosts
	}

	fn generate_to_add(cloud: &cloud::Host, _: &ToolDataSet) -> Result<host::ActiveModel, Unresolved> {
		Ok(host::ActiveModel {
			lcuuid: Set(cloud.lcuuid.clone()),
			name: Set(cloud.name.clone()),
			ip: Set(cloud.ip.clone()),
			htype: Set(cloud.htype),
			vcpu_num: Set(cloud.vcpu_num),
			mem_total: Set(cloud.mem_total),
			az: Set(cloud.az_lcuuid.clone()),
			region: Set(cloud.region_lcuuid.clone()),
			..Default::default()
		})
	}

	fn generate_update(
		cloud: &cloud::Host,
		base: &HostBase,
		_: &ToolDataSet,
	) -> Result<FieldChanges, Unresolved> {
		let mut changes = FieldChanges::default();
		changes
			.compare("name", &base.name, &cloud.name)
			.compare("ip", &base.ip, &cloud.ip)
			.compare("htype", &base.htype, &cloud.htype)
			.compare("vcpu_num", &base.vcpu_num, &cloud.vcpu_num)
			.compare("mem_total", &base.mem_total, &cloud.mem_total)
			.compare("az", &base.az, &cloud.az_lcuuid)
			.compare("region", &base.region, &cloud.region_lcuuid);

		Ok(changes)
	}

	fn index_extra(row: &host::Model, tool: &mut ToolDataSet) {
		tool.register_host_ip(&row.ip, row.id);
		tool.register_device(
			DeviceType::Host,
			row.id,
			DeviceOptions {
				region: row.region.clone(),
				az: row.az.clone(),
				vpc_id: 0,
				host_id: Some(row.id),
				l3_device: Some((DeviceType::Host, row.id)),
			},
		);
	}

	fn unindex_extra(base: &HostBase, tool: &mut ToolDataSet) {
		// Another host may have taken the address over meanwhile
		if tool.host_id_by_ip(&base.ip) == Some(base.id) {
			tool.unregister_host_ip(&base.ip);
		}
		tool.unregister_device(DeviceType::Host, base.id);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_ip_index_follows_host() {
		let mut tool = ToolDataSet::default();

		let base = HostBase {
			id: 3,
			lcuuid: "h-1".into(),
			name: "host".into(),
			ip: "10.0.0.1".into(),
			htype: 3,
			vcpu_num: 8,
			mem_total: 1024,
			az: String::new(),
			region: String::new(),
		};

		tool.register_host_ip("10.0.0.1", 3);
		tool.register_device(DeviceType::Host, 3, DeviceOptions::default());

		// Address reassigned before the old host goes away
		tool.register_host_ip("10.0.0.1", 4);
		Host::unindex_extra(&base, &mut tool);

		assert_eq!(tool.host_id_by_ip("10.0.0.1"), Some(4));
		assert!(tool.device_options(DeviceType::Host, 3).is_none());
	}
}
