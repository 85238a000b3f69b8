//! Recorder configuration
//!
//! Loaded once from a TOML file at startup. Every section has defaults so a minimal file only
//! needs to list the domains this controller reconciles.

use std::{
	collections::{HashMap, HashSet},
	fs,
	path::{Path, PathBuf},
	str::FromStr,
	time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::recorder::{DeletionMode, ResourceType};

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("Failed to read config file {path}: {source}")]
	Read {
		path: PathBuf,
		source: std::io::Error,
	},

	#[error("Failed to parse config: {0}")]
	Parse(#[from] toml::de::Error),

	#[error("Invalid config: {0}")]
	Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecorderConfig {
	#[serde(default)]
	pub controller: ControllerConfig,

	#[serde(default)]
	pub database: DatabaseConfig,

	#[serde(default)]
	pub election: ElectionConfig,

	#[serde(default)]
	pub recorder: ReconcileConfig,

	#[serde(default)]
	pub tagrecorder: TagRecorderConfig,

	#[serde(default)]
	pub source: SourceConfig,

	#[serde(default)]
	pub logging: LoggingConfig,

	/// Reconciliation scopes owned by this controller
	#[serde(default)]
	pub domains: Vec<DomainConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
	/// Identity announced to the leader election, defaults to a random id per process
	pub node_id: String,

	/// Organization every domain belongs to
	pub org_id: i32,
}

impl Default for ControllerConfig {
	fn default() -> Self {
		Self {
			node_id: format!("controller-{}", uuid::Uuid::new_v4()),
			org_id: 1,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
	pub url: String,
	pub max_connections: u32,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			url: "sqlite://recorder.db?mode=rwc".to_string(),
			max_connections: 8,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionMode {
	/// Lease row in the shared store, for multi-controller deployments
	Lease,
	/// Always leader
	Standalone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectionConfig {
	pub mode: ElectionMode,
	pub probe_interval_secs: u64,
	pub lease_ttl_secs: u64,
}

impl Default for ElectionConfig {
	fn default() -> Self {
		Self {
			mode: ElectionMode::Lease,
			probe_interval_secs: 60,
			lease_ttl_secs: 90,
		}
	}
}

impl ElectionConfig {
	pub fn probe_interval(&self) -> Duration {
		Duration::from_secs(self.probe_interval_secs)
	}

	pub fn lease_ttl(&self) -> Duration {
		Duration::from_secs(self.lease_ttl_secs)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
	/// Seconds between two reconciliation passes of the same scope
	pub pass_interval_secs: u64,

	/// Rows per store statement
	pub batch_size: usize,

	/// Consecutive unresolved passes between two warnings for the same item
	pub unresolved_warn_every: u32,

	/// Grace period for pipeline tasks to stop before they're aborted
	pub stop_timeout_secs: u64,

	/// Per resource type override of the deletion mode, keyed by resource type name
	pub deletion: HashMap<String, DeletionMode>,
}

impl Default for ReconcileConfig {
	fn default() -> Self {
		Self {
			pass_interval_secs: 60,
			batch_size: 100,
			unresolved_warn_every: 10,
			stop_timeout_secs: 60,
			deletion: HashMap::new(),
		}
	}
}

impl ReconcileConfig {
	pub fn pass_interval(&self) -> Duration {
		Duration::from_secs(self.pass_interval_secs)
	}

	pub fn stop_timeout(&self) -> Duration {
		Duration::from_secs(self.stop_timeout_secs)
	}

	pub fn deletion_mode(&self, resource_type: ResourceType) -> DeletionMode {
		self.deletion
			.get(resource_type.as_ref())
			.copied()
			.unwrap_or_else(|| resource_type.default_deletion())
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TagRecorderConfig {
	/// Seconds between two full projection consistency checks, 0 disables the check
	pub check_interval_secs: u64,

	pub icons: Vec<IconConfig>,
}

impl Default for TagRecorderConfig {
	fn default() -> Self {
		Self {
			check_interval_secs: 600,
			icons: Vec::new(),
		}
	}
}

/// Icon assigned to a projected node, `sub_type` narrows on the resource's type code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconConfig {
	pub node_type: String,
	#[serde(default)]
	pub sub_type: Option<i32>,
	pub icon_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
	/// Directory holding one `<domain>[.<sub_domain>].json` snapshot per scope
	pub directory: PathBuf,
}

impl Default for SourceConfig {
	fn default() -> Self {
		Self {
			directory: PathBuf::from("snapshots"),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
	/// Filter used when `RUST_LOG` isn't set
	pub filter: String,

	/// Daily rotated log files are written here when set
	pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			filter: "rc_core=info,recorderd=info".to_string(),
			directory: None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
	pub lcuuid: String,
	pub name: String,
	#[serde(default = "default_team_id")]
	pub team_id: i32,
	#[serde(default)]
	pub sub_domains: Vec<SubDomainConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubDomainConfig {
	pub lcuuid: String,
	pub name: String,
	#[serde(default = "default_team_id")]
	pub team_id: i32,
}

fn default_team_id() -> i32 {
	1
}

impl RecorderConfig {
	pub fn load(path: &Path) -> Result<Self> {
		info!("Loading config from {:?}", path);

		let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;

		Self::from_toml(&raw)
	}

	pub fn from_toml(raw: &str) -> Result<Self> {
		let config: Self = toml::from_str(raw)?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if self.controller.node_id.is_empty() {
			return Err(ConfigError::Invalid("controller.node_id is empty".into()));
		}

		if self.recorder.batch_size == 0 {
			return Err(ConfigError::Invalid("recorder.batch_size must be positive".into()));
		}

		if self.election.probe_interval_secs == 0 || self.recorder.pass_interval_secs == 0 {
			return Err(ConfigError::Invalid("intervals must be positive".into()));
		}

		if self.election.mode == ElectionMode::Lease
			&& self.election.lease_ttl_secs <= self.election.probe_interval_secs
		{
			return Err(ConfigError::Invalid(
				"election.lease_ttl_secs must exceed election.probe_interval_secs".into(),
			));
		}

		for resource_type in self.recorder.deletion.keys() {
			if ResourceType::from_str(resource_type).is_err() {
				return Err(ConfigError::Invalid(format!(
					"unknown resource type {resource_type:?} in recorder.deletion"
				)));
			}
		}

		let mut seen = HashSet::new();
		for domain in &self.domains {
			if domain.lcuuid.is_empty() {
				return Err(ConfigError::Invalid(format!(
					"domain {:?} has an empty lcuuid",
					domain.name
				)));
			}

			if !seen.insert(domain.lcuuid.as_str()) {
				return Err(ConfigError::Invalid(format!(
					"domain {} declared twice",
					domain.lcuuid
				)));
			}

			for sub_domain in &domain.sub_domains {
				if sub_domain.lcuuid.is_empty() || !seen.insert(sub_domain.lcuuid.as_str()) {
					return Err(ConfigError::Invalid(format!(
						"sub domain {:?} of {} has an empty or duplicated lcuuid",
						sub_domain.name, domain.lcuuid
					)));
				}
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use pretty_assertions::assert_eq;

	#[test]
	fn test_minimal_config_uses_defaults() {
		let config = RecorderConfig::from_toml(
			r#"
			[[domains]]
			lcuuid = "d-1"
			name = "aliyun"
			"#,
		)
		.unwrap();

		assert_eq!(config.election.mode, ElectionMode::Lease);
		assert_eq!(config.election.probe_interval(), Duration::from_secs(60));
		assert_eq!(config.recorder.batch_size, 100);
		assert_eq!(config.domains[0].team_id, 1);
		assert!(config.domains[0].sub_domains.is_empty());
		assert!(config.controller.node_id.starts_with("controller-"));
	}

	#[test]
	fn test_full_config() {
		let config = RecorderConfig::from_toml(
			r#"
			[controller]
			node_id = "ctrl-a"
			org_id = 3

			[election]
			mode = "standalone"
			probe_interval_secs = 5
			lease_ttl_secs = 15

			[recorder]
			pass_interval_secs = 30
			batch_size = 10
			unresolved_warn_every = 3
			stop_timeout_secs = 5

			[recorder.deletion]
			vm = "hard"

			[[tagrecorder.icons]]
			node_type = "vm"
			sub_type = 1
			icon_id = 7

			[[domains]]
			lcuuid = "d-1"
			name = "aliyun"
			team_id = 2

			[[domains.sub_domains]]
			lcuuid = "sd-1"
			name = "k8s"
			team_id = 4
			"#,
		)
		.unwrap();

		assert_eq!(config.controller.org_id, 3);
		assert_eq!(config.election.mode, ElectionMode::Standalone);
		assert_eq!(config.recorder.deletion_mode(ResourceType::Vm), DeletionMode::Hard);
		assert_eq!(config.recorder.deletion_mode(ResourceType::Host), DeletionMode::Soft);
		assert_eq!(
			config.tagrecorder.icons,
			vec![IconConfig {
				node_type: "vm".into(),
				sub_type: Some(1),
				icon_id: 7,
			}]
		);
		assert_eq!(config.domains[0].sub_domains[0].team_id, 4);
	}

	#[test]
	fn test_rejects_duplicated_domains() {
		let err = RecorderConfig::from_toml(
			r#"
			[[domains]]
			lcuuid = "d-1"
			name = "a"

			[[domains]]
			lcuuid = "d-1"
			name = "b"
			"#,
		)
		.unwrap_err();

		assert!(matches!(err, ConfigError::Invalid(_)));
	}

	#[test]
	fn test_rejects_unknown_deletion_override() {
		let err = RecorderConfig::from_toml(
			r#"
			[recorder.deletion]
			toaster = "hard"
			"#,
		)
		.unwrap_err();

		assert!(matches!(err, ConfigError::Invalid(_)));
	}

	#[test]
	fn test_rejects_short_lease() {
		let err = RecorderConfig::from_toml(
			r#"
			[election]
			probe_interval_secs = 60
			lease_ttl_secs = 30
			"#,
		)
		.unwrap_err();

		assert!(matches!(err, ConfigError::Invalid(_)));
	}

	#[test]
	fn test_load_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("recorder.toml");
		fs::write(&path, "[database]\nurl = \"sqlite::memory:\"\nmax_connections = 1\n").unwrap();

		let config = RecorderConfig::load(&path).unwrap();
		assert_eq!(config.database.url, "sqlite::memory:");

		assert!(matches!(
			RecorderConfig::load(&dir.path().join("missing.toml")),
			Err(ConfigError::Read { .. })
		));
	}
}
