//! Cloud resource recorder
//!
//! Turns collector snapshots into canonical rows. Each reconciliation scope (a domain, or a
//! sub domain inside it) owns a [`cache::Cache`] and is driven by a [`domain::DomainRecorder`]
//! that runs one generic [`updater::Updater`] per resource type.

use serde::{Deserialize, Serialize};

pub mod cache;
pub mod cloud;
pub mod domain;
pub mod field;
pub mod metadata;
pub mod operator;
pub mod order;
pub mod registry;
pub mod source;
pub mod supervisor;
pub mod updater;

pub use metadata::{Metadata, Scope};

#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Hash,
	PartialOrd,
	Ord,
	Serialize,
	Deserialize,
	strum::Display,
	strum::EnumString,
	strum::AsRefStr,
	strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceType {
	Region,
	Az,
	Vpc,
	Network,
	Host,
	Vm,
	Vrouter,
	Lb,
	LbVmConnection,
	PeerConnection,
	PodCluster,
	PodService,
}

impl ResourceType {
	/// Resource types whose surrogate ids this type's rows reference
	pub fn dependencies(self) -> &'static [ResourceType] {
		use ResourceType::*;

		match self {
			Region | Az | Vpc | Host => &[],
			Network | Vm | Vrouter | Lb | PodCluster => &[Vpc],
			LbVmConnection => &[Lb, Vm],
			PeerConnection => &[Vpc, Region],
			PodService => &[PodCluster, Vpc],
		}
	}

	/// Links between resources are removed outright, everything else stays referenceable by
	/// historical data once it disappears from the cloud.
	pub fn default_deletion(self) -> DeletionMode {
		match self {
			Self::LbVmConnection | Self::PeerConnection => DeletionMode::Hard,
			_ => DeletionMode::Soft,
		}
	}

	pub fn device_type(self) -> Option<DeviceType> {
		match self {
			Self::Vm => Some(DeviceType::Vm),
			Self::Vrouter => Some(DeviceType::Vrouter),
			Self::Host => Some(DeviceType::Host),
			Self::Lb => Some(DeviceType::Lb),
			Self::PodCluster => Some(DeviceType::PodCluster),
			Self::PodService => Some(DeviceType::PodService),
			_ => None,
		}
	}
}

/// How a resource that vanished from the snapshot leaves the canonical store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionMode {
	/// The row stays with `deleted_at` set
	Soft,
	/// The row is removed
	Hard,
}

/// Device type codes shared with the query layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DeviceType {
	Vm,
	Vrouter,
	Host,
	Lb,
	PodService,
	PodCluster,
	/// Query layer view of a pod service, listed next to it
	Service,
}

impl DeviceType {
	pub const fn code(self) -> i32 {
		match self {
			Self::Vm => 1,
			Self::Vrouter => 5,
			Self::Host => 6,
			Self::Lb => 15,
			Self::PodService => 11,
			Self::PodCluster => 103,
			Self::Service => 102,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::str::FromStr;

	#[test]
	fn test_resource_type_names() {
		assert_eq!(ResourceType::LbVmConnection.to_string(), "lb_vm_connection");
		assert_eq!(ResourceType::from_str("pod_cluster").unwrap(), ResourceType::PodCluster);
		assert_eq!(
			serde_json::to_string(&ResourceType::PeerConnection).unwrap(),
			"\"peer_connection\""
		);
	}

	#[test]
	fn test_default_deletion() {
		assert_eq!(ResourceType::Vm.default_deletion(), DeletionMode::Soft);
		assert_eq!(ResourceType::LbVmConnection.default_deletion(), DeletionMode::Hard);
	}
}
