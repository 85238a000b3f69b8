//! Snapshot sources
//!
//! Cloud API clients live outside the recorder. What it consumes is the [`SnapshotSource`]
//! boundary: one [`CloudSnapshot`] per scope per pass.

use std::{collections::HashMap, io, path::PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{fs, sync::RwLock};
use tracing::debug;

use super::{cloud::CloudSnapshot, Scope};

#[derive(Debug, Error)]
pub enum SourceError {
	#[error("No snapshot available for {0}")]
	NotFound(Scope),

	#[error("Failed to read snapshot {path}: {source}")]
	Read { path: PathBuf, source: io::Error },

	#[error("Failed to decode snapshot {path}: {source}")]
	Decode {
		path: PathBuf,
		source: serde_json::Error,
	},
}

pub type Result<T> = std::result::Result<T, SourceError>;

#[async_trait]
pub trait SnapshotSource: Send + Sync {
	async fn fetch(&self, scope: &Scope) -> Result<CloudSnapshot>;
}

/// File based import: `<dir>/<domain>.json` for a domain, `<dir>/<domain>.<sub_domain>.json`
/// for a sub domain.
pub struct FileSource {
	directory: PathBuf,
}

impl FileSource {
	pub fn new(directory: impl Into<PathBuf>) -> Self {
		Self {
			directory: directory.into(),
		}
	}

	pub fn path_for(&self, scope: &Scope) -> PathBuf {
		let file_name = match &scope.sub_domain {
			Some(sub_domain) => format!("{}.{}.json", scope.domain, sub_domain),
			None => format!("{}.json", scope.domain),
		};

		self.directory.join(file_name)
	}
}

#[async_trait]
impl SnapshotSource for FileSource {
	async fn fetch(&self, scope: &Scope) -> Result<CloudSnapshot> {
		let path = self.path_for(scope);

		let raw = match fs::read(&path).await {
			Ok(raw) => raw,
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				return Err(SourceError::NotFound(scope.clone()))
			}
			Err(source) => return Err(SourceError::Read { path, source }),
		};

		let snapshot = serde_json::from_slice(&raw)
			.map_err(|source| SourceError::Decode { path: path.clone(), source })?;

		debug!(%scope, path = %path.display(), "Loaded snapshot file");

		Ok(snapshot)
	}
}

/// In-memory snapshots, replaced wholesale by whoever drives it.
#[derive(Default)]
pub struct StaticSource {
	snapshots: RwLock<HashMap<Scope, CloudSnapshot>>,
}

impl StaticSource {
	pub async fn set(&self, scope: Scope, snapshot: CloudSnapshot) {
		self.snapshots.write().await.insert(scope, snapshot);
	}

	pub async fn clear(&self, scope: &Scope) {
		self.snapshots.write().await.remove(scope);
	}
}

#[async_trait]
impl SnapshotSource for StaticSource {
	async fn fetch(&self, scope: &Scope) -> Result<CloudSnapshot> {
		self.snapshots
			.read()
			.await
			.get(scope)
			.cloned()
			.ok_or_else(|| SourceError::NotFound(scope.clone()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::recorder::{cloud, ResourceType};

	#[tokio::test]
	async fn test_file_source_reads_scope_files() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(
			dir.path().join("d-1.json"),
			r#"{"vpcs": [{"lcuuid": "v-1", "name": "default"}], "failed": ["vm"]}"#,
		)
		.unwrap();
		std::fs::write(
			dir.path().join("d-1.sd-1.json"),
			r#"{"pod_clusters": [{"lcuuid": "c-1", "name": "prod", "vpc_lcuuid": "v-1"}]}"#,
		)
		.unwrap();

		let source = FileSource::new(dir.path());

		let snapshot = source.fetch(&Scope::domain("d-1")).await.unwrap();
		assert_eq!(
			snapshot.vpcs,
			vec![cloud::Vpc {
				lcuuid: "v-1".into(),
				name: "default".into(),
				..Default::default()
			}]
		);
		assert!(snapshot.is_failed(ResourceType::Vm));

		let snapshot = source
			.fetch(&Scope::sub_domain("d-1", "sd-1"))
			.await
			.unwrap();
		assert_eq!(snapshot.pod_clusters[0].vpc_lcuuid, "v-1");

		assert!(matches!(
			source.fetch(&Scope::domain("d-2")).await,
			Err(SourceError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_file_source_rejects_garbage() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("d-1.json"), "not json").unwrap();

		assert!(matches!(
			FileSource::new(dir.path())
				.fetch(&Scope::domain("d-1"))
				.await,
			Err(SourceError::Decode { .. })
		));
	}
}
