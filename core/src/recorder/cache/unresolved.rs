//! Bookkeeping for descriptors whose references keep failing to resolve.
//!
//! They are retried on every pass, forever. The count only decides how loudly to log and is
//! exposed so operators can spot permanently dangling references.

use std::collections::{HashMap, HashSet};

use crate::recorder::ResourceType;

#[derive(Debug)]
pub struct UnresolvedTracker {
	warn_every: u32,
	misses: HashMap<(ResourceType, String), u32>,
}

impl UnresolvedTracker {
	pub fn new(warn_every: u32) -> Self {
		Self {
			warn_every: warn_every.max(1),
			misses: HashMap::new(),
		}
	}

	/// Returns how many consecutive passes this item has now failed
	pub fn miss(&mut self, resource_type: ResourceType, lcuuid: &str) -> u32 {
		let count = self
			.misses
			.entry((resource_type, lcuuid.to_string()))
			.or_default();
		*count += 1;
		*count
	}

	pub fn should_warn(&self, attempts: u32) -> bool {
		attempts == 1 || attempts % self.warn_every == 0
	}

	pub fn resolved(&mut self, resource_type: ResourceType, lcuuid: &str) {
		self.misses.remove(&(resource_type, lcuuid.to_string()));
	}

	/// Forgets items that are no longer part of the snapshot
	pub fn retain_present(&mut self, resource_type: ResourceType, present: &HashSet<&str>) {
		self.misses
			.retain(|(kind, lcuuid), _| *kind != resource_type || present.contains(lcuuid.as_str()));
	}

	pub fn attempts(&self, resource_type: ResourceType, lcuuid: &str) -> u32 {
		self.misses
			.get(&(resource_type, lcuuid.to_string()))
			.copied()
			.unwrap_or_default()
	}

	/// Items currently waiting on a reference
	pub fn pending(&self) -> usize {
		self.misses.len()
	}
}
