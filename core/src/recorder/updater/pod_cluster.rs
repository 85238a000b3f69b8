//! Pod clusters are reconciled by sub domains, their VPC usually belongs to the parent domain
//! and is found through the store on first use.

use std::collections::HashMap;

use sea_orm::ActiveValue::Set;

use crate::{
	infra::db::entities::pod_cluster,
	recorder::{
		cache::{diffbase::PodClusterBase, DeviceOptions, DiffBaseDataSet, ToolDataSet, Unresolved},
		cloud::{self, CloudSnapshot},
		field::FieldChanges,
		DeviceType, ResourceType,
	},
};

use super::{resolve_reference, Reconcilable};

pub struct PodCluster;

impl Reconcilable for PodCluster {
	const RESOURCE_TYPE: ResourceType = ResourceType::PodCluster;

	type Cloud = cloud::PodCluster;
	type Row = pod_cluster::Model;
	type Active = pod_cluster::ActiveModel;
	type Entity = pod_cluster::Entity;
	type DiffBase = PodClusterBase;

	fn cloud_items(snapshot: &CloudSnapshot) -> &[cloud::PodCluster] {
		&snapshot.pod_clusters
	}

	fn lcuuid(cloud: &cloud::PodCluster) -> &str {
		&cloud.lcuuid
	}

	fn references(cloud: &cloud::PodCluster) -> Vec<(ResourceType, &str)> {
		vec![(ResourceType::Vpc, cloud.vpc_lcuuid.as_str())]
	}

	fn diff_bases(set: &DiffBaseDataSet) -> &HashMap<String, PodClusterBase> {
		&set.pod_clusters
	}

	fn diff_bases_mut(set: &mut DiffBaseDataSet) -> &mut HashMap<String, PodClusterBase> {
		&mut set.pod_clusters
	}

	fn generate_to_add(
		cloud: &cloud::PodCluster,
		tool: &ToolDataSet,
	) -> Result<pod_cluster::ActiveModel, Unresolved> {
		let vpc_id = tool.resolve(ResourceType::Vpc, &cloud.vpc_lcuuid)?;

		Ok(pod_cluster::ActiveModel {
			lcuuid: Set(cloud.lcuuid.clone()),
			name: Set(cloud.name.clone()),
			version: Set(cloud.version.clone()),
			cluster_name: Set(cloud.cluster_name.clone()),
			vpc_id: Set(vpc_id),
			az: Set(cloud.az_lcuuid.clone()),
			region: Set(cloud.region_lcuuid.clone()),
			..Default::default()
		})
	}

	fn generate_update(
		cloud: &cloud::PodCluster,
		base: &PodClusterBase,
		tool: &ToolDataSet,
	) -> Result<FieldChanges, Unresolved> {
		let vpc_id = resolve_reference(tool, ResourceType::Vpc, base.vpc_id, &cloud.vpc_lcuuid)?;

		let mut changes = FieldChanges::default();
		changes
			.compare("name", &base.name, &cloud.name)
			.compare("version", &base.version, &cloud.version)
			.compare("cluster_name", &base.cluster_name, &cloud.cluster_name)
			.compare("vpc_id", &base.vpc_id, &vpc_id)
			.compare("az", &base.az, &cloud.az_lcuuid)
			.compare("region", &base.region, &cloud.region_lcuuid);

		Ok(changes)
	}

	fn index_extra(row: &pod_cluster::Model, tool: &mut ToolDataSet) {
		tool.register_device(
			DeviceType::PodCluster,
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

	fn unindex_extra(base: &PodClusterBase, tool: &mut ToolDataSet) {
		tool.unregister_device(DeviceType::PodCluster, base.id);
	}
}
