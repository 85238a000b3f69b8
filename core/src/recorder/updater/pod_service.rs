//! Pod services belong to a pod cluster of the same sub domain, their VPC is usually the
//! parent domain's.

use std::collections::HashMap;

use sea_orm::ActiveValue::Set;

use crate::{
	infra::db::entities::pod_service,
	recorder::{
		cache::{diffbase::PodServiceBase, DeviceOptions, DiffBaseDataSet, ToolDataSet, Unresolved},
		cloud::{self, CloudSnapshot},
		field::FieldChanges,
		DeviceType, ResourceType,
	},
};

use super::{resolve_reference, Reconcilable};

pub struct PodService;

impl Reconcilable for PodService {
	const RESOURCE_TYPE: ResourceType = ResourceType::PodService;

	type Cloud = cloud::PodService;
	type Row = pod_service::Model;
	type Active = pod_service::ActiveModel;
	type Entity = pod_service::Entity;
	type DiffBase = PodServiceBase;

	fn cloud_items(snapshot: &CloudSnapshot) -> &[cloud::PodService] {
		&snapshot.pod_services
	}

	fn lcuuid(cloud: &cloud::PodService) -> &str {
		&cloud.lcuuid
	}

	fn references(cloud: &cloud::PodService) -> Vec<(ResourceType, &str)> {
		vec![
			(ResourceType::PodCluster, cloud.pod_cluster_lcuuid.as_str()),
			(ResourceType::Vpc, cloud.vpc_lcuuid.as_str()),
		]
	}

	fn diff_bases(set: &DiffBaseDataSet) -> &HashMap<String, PodServiceBase> {
		&set.pod_services
	}

	fn diff_bases_mut(set: &mut DiffBaseDataSet) -> &mut HashMap<String, PodServiceBase> {
		&mut set.pod_services
	}

	fn generate_to_add(
		cloud: &cloud::PodService,
		tool: &ToolDataSet,
	) -> Result<pod_service::ActiveModel, Unresolved> {
		let pod_cluster_id = tool.resolve(ResourceType::PodCluster, &cloud.pod_cluster_lcuuid)?;
		let vpc_id = tool.resolve(ResourceType::Vpc, &cloud.vpc_lcuuid)?;

		Ok(pod_service::ActiveModel {
			lcuuid: Set(cloud.lcuuid.clone()),
			name: Set(cloud.name.clone()),
			label: Set(cloud.label.clone()),
			service_type: Set(cloud.service_type),
			cluster_ip: Set(cloud.cluster_ip.clone()),
			pod_cluster_id: Set(pod_cluster_id),
			vpc_id: Set(vpc_id),
			az: Set(cloud.az_lcuuid.clone()),
			region: Set(cloud.region_lcuuid.clone()),
			..Default::default()
		})
	}

	fn generate_update(
		cloud: &cloud::PodService,
		base: &PodServiceBase,
		tool: &ToolDataSet,
	) -> Result<FieldChanges, Unresolved> {
		let pod_cluster_id = resolve_reference(
			tool,
			ResourceType::PodCluster,
			base.pod_cluster_id,
			&cloud.pod_cluster_lcuuid,
		)?;
		let vpc_id = resolve_reference(tool, ResourceType::Vpc, base.vpc_id, &cloud.vpc_lcuuid)?;

		let mut changes = FieldChanges::default();
		changes
			.compare("name", &base.name, &cloud.name)
			.compare("label", &base.label, &cloud.label)
			.compare("service_type", &base.service_type, &cloud.service_type)
			.compare("cluster_ip", &base.cluster_ip, &cloud.cluster_ip)
			.compare("pod_cluster_id", &base.pod_cluster_id, &pod_cluster_id)
			.compare("vpc_id", &base.vpc_id, &vpc_id)
			.compare("az", &base.az, &cloud.az_lcuuid)
			.compare("region", &base.region, &cloud.region_lcuuid);

		Ok(changes)
	}

	fn index_extra(row: &pod_service::Model, tool: &mut ToolDataSet) {
		tool.register_device(
			DeviceType::PodService,
			row.id,
			DeviceOptions {
				region: row.region.clone(),
				az: row.az.clone(),
				vpc_id: row.vpc_id,
				host_id: None,
				l3_device: None,
			},
		);
	}

	fn unindex_extra(base: &PodServiceBase, tool: &mut ToolDataSet) {
		tool.unregister_device(DeviceType::PodService, base.id);
	}
}
