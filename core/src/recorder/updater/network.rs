use std::collections::HashMap;

use sea_orm::ActiveValue::Set;

use crate::{
	infra::db::entities::network,
	recorder::{
		cache::{diffbase::NetworkBase, DiffBaseDataSet, ToolDataSet, Unresolved},
		cloud::{self, CloudSnapshot},
		field::FieldChanges,
		ResourceType,
	},
};

use super::{resolve_reference, Reconcilable};

pub struct Network;

impl Reconcilable for Network {
	const RESOURCE_TYPE: ResourceType = ResourceType::Network;

	type Cloud = cloud::Network;
	type Row = network::Model;
	type Active = network::ActiveModel;
	type Entity = network::Entity;
	type DiffBase = NetworkBase;

	fn cloud_items(snapshot: &CloudSnapshot) -> &[cloud::Network] {
		&snapshot.networks
	}

	fn lcuuid(cloud: &cloud::Network) -> &str {
		&cloud.lcuuid
	}

	fn references(cloud: &cloud::Network) -> Vec<(ResourceType, &str)> {
		vec![(ResourceType::Vpc, cloud.vpc_lcuuid.as_str())]
	}

	fn diff_bases(set: &DiffBaseDataSet) -> &HashMap<String, NetworkBase> {
		&set.networks
	}

	fn diff_bases_mut(set: &mut DiffBaseDataSet) -> &mut HashMap<String, NetworkBase> {
		&mut set.networks
	}

	fn generate_to_add(
		cloud: &cloud::Network,
		tool: &ToolDataSet,
	) -> Result<network::ActiveModel, Unresolved> {
		let vpc_id = tool.resolve(ResourceType::Vpc, &cloud.vpc_lcuuid)?;

		Ok(network::ActiveModel {
			lcuuid: Set(cloud.lcuuid.clone()),
			name: Set(cloud.name.clone()),
			label: Set(cloud.label.clone()),
			cidr: Set(cloud.cidr.clone()),
			net_type: Set(cloud.net_type),
			vpc_id: Set(vpc_id),
			az: Set(cloud.az_lcuuid.clone()),
			region: Set(cloud.region_lcuuid.clone()),
			..Default::default()
		})
	}

	fn generate_update(
		cloud: &cloud::Network,
		base: &NetworkBase,
		tool: &ToolDataSet,
	) -> Result<FieldChanges, Unresolved> {
		let vpc_id = resolve_reference(tool, ResourceType::Vpc, base.vpc_id, &cloud.vpc_lcuuid)?;

		let mut changes = FieldChanges::default();
		changes
			.compare("name", &base.name, &cloud.name)
			.compare("label", &base.label, &cloud.label)
			.compare("cidr", &base.cidr, &cloud.cidr)
			.compare("net_type", &base.net_type, &cloud.net_type)
			.compare("vpc_id", &base.vpc_id, &vpc_id)
			.compare("az", &base.az, &cloud.az_lcuuid)
			.compare("region", &base.region, &cloud.region_lcuuid);

		Ok(changes)
	}
}
