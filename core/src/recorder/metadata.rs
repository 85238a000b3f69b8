use std::fmt;

use serde::{Deserialize, Serialize};

/// A reconciliation scope: a whole domain, or one sub domain inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
	pub domain: String,
	pub sub_domain: Option<String>,
}

impl Scope {
	pub fn domain(domain: impl Into<String>) -> Self {
		Self {
			domain: domain.into(),
			sub_domain: None,
		}
	}

	pub fn sub_domain(domain: impl Into<String>, sub_domain: impl Into<String>) -> Self {
		Self {
			domain: domain.into(),
			sub_domain: Some(sub_domain.into()),
		}
	}

	/// Value stored in the `sub_domain` column of canonical rows, empty for domain scopes
	pub fn sub_domain_column(&self) -> &str {
		self.sub_domain.as_deref().unwrap_or_default()
	}
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.sub_domain {
			Some(sub_domain) => write!(f, "{}/{}", self.domain, sub_domain),
			None => f.write_str(&self.domain),
		}
	}
}

/// Tenant and domain identity attached to every change message of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
	pub org_id: i32,
	pub team_id: i32,
	pub domain_id: i32,
	pub domain_lcuuid: String,
	pub domain_name: String,
	pub sub_domain_id: Option<i32>,
	pub sub_domain_lcuuid: Option<String>,
}

impl Metadata {
	pub fn scope(&self) -> Scope {
		Scope {
			domain: self.domain_lcuuid.clone(),
			sub_domain: self.sub_domain_lcuuid.clone(),
		}
	}

	/// Projection tables store 0 for domain level rows
	pub fn sub_domain_id_or_zero(&self) -> i32 {
		self.sub_domain_id.unwrap_or_default()
	}
}
