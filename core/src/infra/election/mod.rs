//! Leader election
//!
//! Only the elected controller writes to the canonical store. A [`LeadershipProvider`] is
//! polled by the [`gate::LeadershipGate`], which starts and stops the reconciliation pipeline
//! as this process gains or loses leadership.

use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;

pub mod gate;
pub mod lease;

pub use gate::{GateError, LeadershipGate, Role, TermError, TermSupervisor};
pub use lease::LeaseLeadership;

#[derive(Debug, Error)]
pub enum LeaderError {
	#[error("Lease store error: {0}")]
	Db(#[from] DbErr),
}

pub type Result<T> = std::result::Result<T, LeaderError>;

#[async_trait]
pub trait LeadershipProvider: Send + Sync {
	/// Whether this process currently leads, along with the leader's identity
	async fn is_leader(&self) -> Result<(bool, String)>;

	/// Gives up leadership early, so a successor doesn't wait for the lease to run out
	async fn release(&self) -> Result<()> {
		Ok(())
	}
}

/// Single controller deployments, always the leader
#[derive(Debug, Clone)]
pub struct StandaloneLeadership {
	node_id: String,
}

impl StandaloneLeadership {
	pub fn new(node_id: impl Into<String>) -> Self {
		Self {
			node_id: node_id.into(),
		}
	}
}

#[async_trait]
impl LeadershipProvider for StandaloneLeadership {
	async fn is_leader(&self) -> Result<(bool, String)> {
		Ok((true, self.node_id.clone()))
	}
}
