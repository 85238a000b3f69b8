//! Diff bases: the tracked subset of each canonical row, mirrored in memory so a pass can
//! detect changes without reading the store.

use std::{collections::HashMap, fmt::Debug};

use crate::infra::db::entities;

pub trait DiffBase: Clone + Debug + PartialEq + Send + Sync + 'static {
	fn id(&self) -> i32;
	fn lcuuid(&self) -> &str;
}

macro_rules! diff_base {
	($name:ident from $entity:ident { $($field:ident: $ty:ty),* $(,)? }) => {
		#[derive(Debug, Clone, PartialEq, Eq)]
		pub struct $name {
			pub id: i32,
			pub lcuuid: String,
			$(pub $field: $ty,)*
		}

		impl From<&entities::$entity::Model> for $name {
			fn from(row: &entities::$entity::Model) -> Self {
				Self {
					id: row.id,
					lcuuid: row.lcuuid.clone(),
					$($field: row.$field.clone(),)*
				}
			}
		}

		impl DiffBase for $name {
			fn id(&self) -> i32 {
				self.id
			}

			fn lcuuid(&self) -> &str {
				&self.lcuuid
			}
		}
	};
}

diff_base!(RegionBase from region { name: String, label: String });

diff_base!(AzBase from az { name: String, label: String, region: String });

diff_base!(VpcBase from vpc {
	name: String,
	label: String,
	cidr: String,
	region: String,
});

diff_base!(NetworkBase from network {
	name: String,
	label: String,
	cidr: String,
	net_type: i32,
	vpc_id: i32,
	az: String,
	region: String,
});

diff_base!(HostBase from host {
	name: String,
	ip: String,
	htype: i32,
	vcpu_num: i32,
	mem_total: i32,
	az: String,
	region: String,
});

diff_base!(VmBase from vm {
	name: String,
	label: String,
	htype: i32,
	state: i32,
	launch_server: String,
	vpc_id: i32,
	az: String,
	region: String,
});

diff_base!(VrouterBase from vrouter {
	name: String,
	label: String,
	gw_launch_server: String,
	vpc_id: i32,
	region: String,
});

diff_base!(LbBase from lb {
	name: String,
	label: String,
	model: i32,
	vip: String,
	vpc_id: i32,
	region: String,
});

diff_base!(LbVmConnectionBase from lb_vm_connection { lb_id: i32, vm_id: i32 });

diff_base!(PeerConnectionBase from peer_connection {
	name: String,
	local_vpc_id: i32,
	remote_vpc_id: i32,
	local_region_id: i32,
	remote_region_id: i32,
});

diff_base!(PodClusterBase from pod_cluster {
	name: String,
	version: String,
	cluster_name: String,
	vpc_id: i32,
	az: String,
	region: String,
});

diff_base!(PodServiceBase from pod_service {
	name: String,
	label: String,
	service_type: i32,
	cluster_ip: String,
	pod_cluster_id: i32,
	vpc_id: i32,
	az: String,
	region: String,
});

/// Diff bases of one scope, keyed by lcuuid per resource type
#[derive(Debug, Default)]
pub struct DiffBaseDataSet {
	pub regions: HashMap<String, RegionBase>,
	pub azs: HashMap<String, AzBase>,
	pub vpcs: HashMap<String, VpcBase>,
	pub networks: HashMap<String, NetworkBase>,
	pub hosts: HashMap<String, HostBase>,
	pub vms: HashMap<String, VmBase>,
	pub vrouters: HashMap<String, VrouterBase>,
	pub lbs: HashMap<String, LbBase>,
	pub lb_vm_connections: HashMap<String, LbVmConnectionBase>,
	pub peer_connections: HashMap<String, PeerConnectionBase>,
	pub pod_clusters: HashMap<String, PodClusterBase>,
	pub pod_services: HashMap<String, PodServiceBase>,
}

impl DiffBaseDataSet {
	pub fn len(&self) -> usize {
		self.regions.len()
			+ self.azs.len()
			+ self.vpcs.len()
			+ self.networks.len()
			+ self.hosts.len()
			+ self.vms.len()
			+ self.vrouters.len()
			+ self.lbs.len()
			+ self.lb_vm_connections.len()
			+ self.peer_connections.len()
			+ self.pod_clusters.len()
			+ self.pod_services.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
