use std::collections::HashMap;

use sea_orm::ActiveValue::Set;

use crate::{
	infra::db::entities::peer_connection,
	recorder::{
		cache::{diffbase::PeerConnectionBase, DiffBaseDataSet, ToolDataSet, Unresolved},
		cloud::{self, CloudSnapshot},
		field::FieldChanges,
		ResourceType,
	},
};

use super::{resolve_reference, Reconcilable};

pub struct PeerConnection;

impl Reconcilable for PeerConnection {
	const RESOURCE_TYPE: ResourceType = ResourceType::PeerConnection;

	type Cloud = cloud::PeerConnection;
	type Row = peer_connection::Model;
	type Active = peer_connection::ActiveModel;
	type Entity = peer_connection::Entity;
	type DiffBase = PeerConnectionBase;

	fn cloud_items(snapshot: &CloudSnapshot) -> &[cloud::PeerConnection] {
		&snapshot.peer_connections
	}

	fn lcuuid(cloud: &cloud::PeerConnection) -> &str {
		&cloud.lcuuid
	}

	fn references(cloud: &cloud::PeerConnection) -> Vec<(ResourceType, &str)> {
		vec![
			(ResourceType::Vpc, cloud.local_vpc_lcuuid.as_str()),
			(ResourceType::Vpc, cloud.remote_vpc_lcuuid.as_str()),
			(ResourceType::Region, cloud.local_region_lcuuid.as_str()),
			(ResourceType::Region, cloud.remote_region_lcuuid.as_str()),
		]
	}

	fn diff_bases(set: &DiffBaseDataSet) -> &HashMap<String, PeerConnectionBase> {
		&set.peer_connections
	}

	fn diff_bases_mut(set: &mut DiffBaseDataSet) -> &mut HashMap<String, PeerConnectionBase> {
		&mut set.peer_connections
	}

	fn generate_to_add(
		cloud: &cloud::PeerConnection,
		tool: &ToolDataSet,
	) -> Result<peer_connection::ActiveModel, Unresolved> {
		Ok(peer_connection::ActiveModel {
			lcuuid: Set(cloud.lcuuid.clone()),
			name: Set(cloud.name.clone()),
			local_vpc_id: Set(tool.resolve(ResourceType::Vpc, &cloud.local_vpc_lcuuid)?),
			remote_vpc_id: Set(tool.resolve(ResourceType::Vpc, &cloud.remote_vpc_lcuuid)?),
			local_region_id: Set(tool.resolve(ResourceType::Region, &cloud.local_region_lcuuid)?),
			remote_region_id: Set(tool.resolve(ResourceType::Region, &cloud.remote_region_lcuuid)?),
			..Default::default()
		})
	}

	fn generate_update(
		cloud: &cloud::PeerConnection,
		base: &PeerConnectionBase,
		tool: &ToolDataSet,
	) -> Result<FieldChanges, Unresolved> {
		let local_vpc_id = resolve_reference(
			tool,
			ResourceType::Vpc,
			base.local_vpc_id,
			&cloud.local_vpc_lcuuid,
		)?;
		let remote_vpc_id = resolve_reference(
			tool,
			ResourceType::Vpc,
			base.remote_vpc_id,
			&cloud.remote_vpc_lcuuid,
		)?;
		let local_region_id = resolve_reference(
			tool,
			ResourceType::Region,
			base.local_region_id,
			&cloud.local_region_lcuuid,
		)?;
		let remote_region_id = resolve_reference(
			tool,
			ResourceType::Region,
			base.remote_region_id,
			&cloud.remote_region_lcuuid,
		)?;

		let mut changes = FieldChanges::default();
		changes
			.compare("name", &base.name, &cloud.name)
			.compare("local_vpc_id", &base.local_vpc_id, &local_vpc_id)
			.compare("remote_vpc_id", &base.remote_vpc_id, &remote_vpc_id)
			.compare("local_region_id", &base.local_region_id, &local_region_id)
			.compare("remote_region_id", &base.remote_region_id, &remote_region_id);

		Ok(changes)
	}
}
