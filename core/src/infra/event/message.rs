//! Messages carried by the event bus

use serde::Serialize;

use crate::recorder::{field::FieldsUpdate, Metadata};

/// Committed change to rows of one resource type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ResourceChange<M> {
	/// Rows inserted or revived by one batch
	Added(Vec<M>),
	/// A single row whose tracked fields changed, `row` is the committed state
	Updated { update: FieldsUpdate, row: M },
	/// Rows removed from the snapshot, as they were before the delete
	Deleted { lcuuids: Vec<String>, rows: Vec<M> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeMessage<M> {
	pub metadata: Metadata,
	pub change: ResourceChange<M>,
}

impl<M> ChangeMessage<M> {
	pub fn added(metadata: Metadata, rows: Vec<M>) -> Self {
		Self {
			metadata,
			change: ResourceChange::Added(rows),
		}
	}

	pub fn updated(metadata: Metadata, update: FieldsUpdate, row: M) -> Self {
		Self {
			metadata,
			change: ResourceChange::Updated { update, row },
		}
	}

	pub fn deleted(metadata: Metadata, lcuuids: Vec<String>, rows: Vec<M>) -> Self {
		Self {
			metadata,
			change: ResourceChange::Deleted { lcuuids, rows },
		}
	}

	pub fn kind(&self) -> &'static str {
		match self.change {
			ResourceChange::Added(_) => "added",
			ResourceChange::Updated { .. } => "updated",
			ResourceChange::Deleted { .. } => "deleted",
		}
	}
}

/// Domain lifecycle, published by the registry when configuration drops or changes a scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DomainMessage {
	DomainDeleted(Metadata),
	SubDomainDeleted(Metadata),
	/// `metadata.team_id` holds the new team
	SubDomainTeamChanged { metadata: Metadata, old_team_id: i32 },
}

impl DomainMessage {
	pub fn metadata(&self) -> &Metadata {
		match self {
			Self::DomainDeleted(metadata)
			| Self::SubDomainDeleted(metadata)
			| Self::SubDomainTeamChanged { metadata, .. } => metadata,
		}
	}
}
