use std::collections::HashMap;

use crate::config::IconConfig;

/// Icon ids by node type, optionally narrowed by the resource's type code
#[derive(Debug, Clone, Default)]
pub struct IconMap {
	icons: HashMap<(String, Option<i32>), i32>,
}

impl IconMap {
	pub fn new(icons: &[IconConfig]) -> Self {
		Self {
			icons: icons
				.iter()
				.map(|icon| ((icon.node_type.clone(), icon.sub_type), icon.icon_id))
				.collect(),
		}
	}

	/// Exact sub type match first, then the node type default, 0 when nothing is configured
	pub fn lookup(&self, node_type: &str, sub_type: Option<i32>) -> i32 {
		sub_type
			.and_then(|sub_type| {
				self.icons
					.get(&(node_type.to_string(), Some(sub_type)))
					.copied()
			})
			.or_else(|| self.icons.get(&(node_type.to_string(), None)).copied())
			.unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_lookup_falls_back_to_node_type() {
		let icons = IconMap::new(&[
			IconConfig {
				node_type: "vm".into(),
				sub_type: None,
				icon_id: 1,
			},
			IconConfig {
				node_type: "vm".into(),
				sub_type: Some(3),
				icon_id: 7,
			},
		]);

		assert_eq!(icons.lookup("vm", Some(3)), 7);
		assert_eq!(icons.lookup("vm", Some(4)), 1);
		assert_eq!(icons.lookup("vm", None), 1);
		assert_eq!(icons.lookup("host", Some(3)), 0);
	}
}
