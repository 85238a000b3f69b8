//! Resource descriptors as produced by collectors
//!
//! References to other resources are always by lcuuid, the recorder resolves them into
//! surrogate ids. Nothing here is trusted to be referentially consistent.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::ResourceType;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Region {
	pub lcuuid: String,
	pub name: String,
	pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Az {
	pub lcuuid: String,
	pub name: String,
	pub label: String,
	pub region_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vpc {
	pub lcuuid: String,
	pub name: String,
	pub label: String,
	pub cidr: String,
	pub region_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Network {
	pub lcuuid: String,
	pub name: String,
	pub label: String,
	pub cidr: String,
	pub net_type: i32,
	pub vpc_lcuuid: String,
	pub az_lcuuid: String,
	pub region_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Host {
	pub lcuuid: String,
	pub name: String,
	pub ip: String,
	pub htype: i32,
	pub vcpu_num: i32,
	pub mem_total: i32,
	pub az_lcuuid: String,
	pub region_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vm {
	pub lcuuid: String,
	pub name: String,
	pub label: String,
	pub htype: i32,
	pub state: i32,
	/// IP of the host running the VM
	pub launch_server: String,
	pub vpc_lcuuid: String,
	pub az_lcuuid: String,
	pub region_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vrouter {
	pub lcuuid: String,
	pub name: String,
	pub label: String,
	pub gw_launch_server: String,
	pub vpc_lcuuid: String,
	pub region_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lb {
	pub lcuuid: String,
	pub name: String,
	pub label: String,
	pub model: i32,
	pub vip: String,
	pub vpc_lcuuid: String,
	pub region_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LbVmConnection {
	pub lcuuid: String,
	pub lb_lcuuid: String,
	pub vm_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConnection {
	pub lcuuid: String,
	pub name: String,
	pub local_vpc_lcuuid: String,
	pub remote_vpc_lcuuid: String,
	pub local_region_lcuuid: String,
	pub remote_region_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodCluster {
	pub lcuuid: String,
	pub name: String,
	pub version: String,
	pub cluster_name: String,
	pub vpc_lcuuid: String,
	pub az_lcuuid: String,
	pub region_lcuuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodService {
	pub lcuuid: String,
	pub name: String,
	pub label: String,
	pub service_type: i32,
	pub cluster_ip: String,
	pub pod_cluster_lcuuid: String,
	pub vpc_lcuuid: String,
	pub az_lcuuid: String,
	pub region_lcuuid: String,
}

/// Everything a collector reported for one scope in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSnapshot {
	pub regions: Vec<Region>,
	pub azs: Vec<Az>,
	pub vpcs: Vec<Vpc>,
	pub networks: Vec<Network>,
	pub hosts: Vec<Host>,
	pub vms: Vec<Vm>,
	pub vrouters: Vec<Vrouter>,
	pub lbs: Vec<Lb>,
	pub lb_vm_connections: Vec<LbVmConnection>,
	pub peer_connections: Vec<PeerConnection>,
	pub pod_clusters: Vec<PodCluster>,
	pub pod_services: Vec<PodService>,

	/// Resource types the collector failed to fetch this cycle, left untouched by the pass
	pub failed: HashSet<ResourceType>,
}

impl CloudSnapshot {
	pub fn is_failed(&self, resource_type: ResourceType) -> bool {
		self.failed.contains(&resource_type)
	}
}
