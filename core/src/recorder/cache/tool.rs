//! Tool index: lcuuid and surrogate id lookups used to resolve references between resources.

use std::collections::HashMap;

use thiserror::Error;

use crate::recorder::{DeviceType, ResourceType};

/// A reference the index can't resolve yet, usually because the referenced resource hasn't
/// been reconciled so far.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{resource_type} (lcuuid: {lcuuid:?}) not found")]
pub struct Unresolved {
	pub resource_type: ResourceType,
	pub lcuuid: String,
}

/// Tags a device's events can be enriched with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceOptions {
	pub region: String,
	pub az: String,
	pub vpc_id: i32,
	pub host_id: Option<i32>,
	/// Layer 3 device traffic of this device is attributed to, if any
	pub l3_device: Option<(DeviceType, i32)>,
}

#[derive(Debug, Default)]
pub struct ToolDataSet {
	ids: HashMap<ResourceType, HashMap<String, i32>>,
	lcuuids: HashMap<ResourceType, HashMap<i32, String>>,
	host_ids_by_ip: HashMap<String, i32>,
	devices: HashMap<(DeviceType, i32), DeviceOptions>,
}

impl ToolDataSet {
	pub fn register(&mut self, resource_type: ResourceType, lcuuid: &str, id: i32) {
		self.ids
			.entry(resource_type)
			.or_default()
			.insert(lcuuid.to_string(), id);
		self.lcuuids
			.entry(resource_type)
			.or_default()
			.insert(id, lcuuid.to_string());
	}

	pub fn unregister(&mut self, resource_type: ResourceType, lcuuid: &str) {
		if let Some(id) = self
			.ids
			.get_mut(&resource_type)
			.and_then(|ids| ids.remove(lcuuid))
		{
			if let Some(lcuuids) = self.lcuuids.get_mut(&resource_type) {
				lcuuids.remove(&id);
			}
		}
	}

	pub fn id(&self, resource_type: ResourceType, lcuuid: &str) -> Option<i32> {
		self.ids
			.get(&resource_type)
			.and_then(|ids| ids.get(lcuuid))
			.copied()
	}

	pub fn lcuuid(&self, resource_type: ResourceType, id: i32) -> Option<&str> {
		self.lcuuids
			.get(&resource_type)
			.and_then(|lcuuids| lcuuids.get(&id))
			.map(String::as_str)
	}

	pub fn resolve(&self, resource_type: ResourceType, lcuuid: &str) -> Result<i32, Unresolved> {
		self.id(resource_type, lcuuid).ok_or_else(|| Unresolved {
			resource_type,
			lcuuid: lcuuid.to_string(),
		})
	}

	pub fn register_host_ip(&mut self, ip: &str, id: i32) {
		if !ip.is_empty() {
			self.host_ids_by_ip.insert(ip.to_string(), id);
		}
	}

	pub fn unregister_host_ip(&mut self, ip: &str) {
		self.host_ids_by_ip.remove(ip);
	}

	pub fn host_id_by_ip(&self, ip: &str) -> Option<i32> {
		self.host_ids_by_ip.get(ip).copied()
	}

	pub fn register_device(&mut self, device_type: DeviceType, id: i32, options: DeviceOptions) {
		self.devices.insert((device_type, id), options);
	}

	pub fn unregister_device(&mut self, device_type: DeviceType, id: i32) {
		self.devices.remove(&(device_type, id));
	}

	pub fn device_options(&self, device_type: DeviceType, id: i32) -> Option<&DeviceOptions> {
		self.devices.get(&(device_type, id))
	}

	pub fn len(&self, resource_type: ResourceType) -> usize {
		self.ids.get(&resource_type).map_or(0, HashMap::len)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_register_and_resolve() {
		let mut tool = ToolDataSet::default();
		tool.register(ResourceType::Vpc, "v-1", 7);

		assert_eq!(tool.resolve(ResourceType::Vpc, "v-1"), Ok(7));
		assert_eq!(tool.lcuuid(ResourceType::Vpc, 7), Some("v-1"));
		assert_eq!(
			tool.resolve(ResourceType::Network, "v-1"),
			Err(Unresolved {
				resource_type: ResourceType::Network,
				lcuuid: "v-1".into(),
			})
		);

		tool.unregister(ResourceType::Vpc, "v-1");
		assert_eq!(tool.id(ResourceType::Vpc, "v-1"), None);
		assert_eq!(tool.lcuuid(ResourceType::Vpc, 7), None);
		assert_eq!(tool.len(ResourceType::Vpc), 0);
	}

	#[test]
	fn test_host_ip_and_devices() {
		let mut tool = ToolDataSet::default();
		tool.register_host_ip("10.0.0.1", 3);
		tool.register_host_ip("", 4);

		assert_eq!(tool.host_id_by_ip("10.0.0.1"), Some(3));
		assert_eq!(tool.host_id_by_ip(""), None);

		tool.register_device(
			DeviceType::Vm,
			9,
			DeviceOptions {
				region: "r-1".into(),
				vpc_id: 2,
				host_id: tool.host_id_by_ip("10.0.0.1"),
				l3_device: Some((DeviceType::Vm, 9)),
				..Default::default()
			},
		);
		assert_eq!(
			tool.device_options(DeviceType::Vm, 9).and_then(|o| o.host_id),
			Some(3)
		);
		assert_eq!(
			tool.device_options(DeviceType::Vm, 9).and_then(|o| o.l3_device),
			Some((DeviceType::Vm, 9))
		);

		tool.unregister_device(DeviceType::Vm, 9);
		assert!(tool.device_options(DeviceType::Vm, 9).is_none());
	}
}
