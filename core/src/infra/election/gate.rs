//! Leadership gate
//!
//! A small state machine probing the [`LeadershipProvider`] at a fixed interval. Winning the
//! election starts a term on the [`TermSupervisor`], losing it stops the term. A schema
//! migration failure while starting a term is the only error the gate gives up on.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::recorder::{domain::RecorderError, operator::StoreError};

use super::LeadershipProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
	Candidate,
	Leader,
	Follower,
}

#[derive(Debug, Error)]
pub enum TermError {
	#[error("Schema migration failed: {0}")]
	Migration(DbErr),

	#[error(transparent)]
	Store(#[from] StoreError),

	#[error(transparent)]
	Recorder(#[from] RecorderError),
}

#[derive(Debug, Error)]
pub enum GateError {
	#[error("Schema migration failed on leadership acquisition: {0}")]
	Migration(DbErr),
}

/// Owns whatever runs while this process leads
#[async_trait]
pub trait TermSupervisor: Send + Sync {
	async fn start_term(&self) -> Result<(), TermError>;

	/// Stops the running term, waiting for its tasks. No-op without a term.
	async fn stop_term(&self);
}

pub struct LeadershipGate {
	provider: Arc<dyn LeadershipProvider>,
	supervisor: Arc<dyn TermSupervisor>,
	probe_interval: Duration,
	role: Role,
	leader: String,
}

impl LeadershipGate {
	pub fn new(
		provider: Arc<dyn LeadershipProvider>,
		supervisor: Arc<dyn TermSupervisor>,
		probe_interval: Duration,
	) -> Self {
		Self {
			provider,
			supervisor,
			probe_interval,
			role: Role::Candidate,
			leader: String::new(),
		}
	}

	pub fn role(&self) -> Role {
		self.role
	}

	/// Identity of the leader seen by the last successful probe
	pub fn leader(&self) -> &str {
		&self.leader
	}

	/// One probe and the transition it implies
	pub async fn tick(&mut self) -> Result<Role, GateError> {
		let (is_leader, leader) = match self.provider.is_leader().await {
			Ok(probe) => probe,
			Err(e) => {
				warn!(role = %self.role, ?e, "Leadership probe failed, keeping current role");
				return Ok(self.role);
			}
		};

		if leader != self.leader {
			info!(%leader, "Leader changed");
			self.leader = leader;
		}

		match (is_leader, self.role) {
			(true, Role::Leader) | (false, Role::Follower) => {
				debug!(role = %self.role, leader = %self.leader, "Leadership unchanged");
			}

			(true, _) => {
				info!("Leadership acquired, starting term");

				match self.supervisor.start_term().await {
					Ok(()) => self.role = Role::Leader,
					Err(TermError::Migration(e)) => {
						error!(?e, "Schema migration failed, giving up");
						self.supervisor.stop_term().await;
						return Err(GateError::Migration(e));
					}
					Err(e) => {
						error!(?e, "Failed to start term, retrying on next probe");
						self.supervisor.stop_term().await;
						self.role = Role::Candidate;
					}
				}
			}

			(false, Role::Leader) => {
				warn!(leader = %self.leader, "Leadership lost, stopping term");
				self.supervisor.stop_term().await;
				self.role = Role::Follower;
			}

			(false, Role::Candidate) => {
				info!(leader = %self.leader, "Following elected leader");
				self.role = Role::Follower;
			}
		}

		Ok(self.role)
	}

	/// Probes until `shutdown` fires, then stops any running term and gives the lease up
	#[instrument(skip_all)]
	pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), GateError> {
		let mut ticker = interval(self.probe_interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		let outcome = loop {
			tokio::select! {
				() = shutdown.cancelled() => break Ok(()),
				_ = ticker.tick() => {
					if let Err(e) = self.tick().await {
						break Err(e);
					}
				}
			}
		};

		if self.role == Role::Leader {
			self.supervisor.stop_term().await;
		}

		if let Err(e) = self.provider.release().await {
			warn!(?e, "Failed to release leadership");
		}

		info!("Leadership gate stopped");

		outcome
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Mutex,
	};

	use crate::infra::election::LeaderError;

	#[derive(Default)]
	struct ScriptedProvider {
		probes: Mutex<Vec<Option<bool>>>,
	}

	impl ScriptedProvider {
		fn new(script: &[Option<bool>]) -> Arc<Self> {
			let mut probes = script.to_vec();
			probes.reverse();
			Arc::new(Self {
				probes: Mutex::new(probes),
			})
		}
	}

	#[async_trait]
	impl LeadershipProvider for ScriptedProvider {
		async fn is_leader(&self) -> Result<(bool, String), LeaderError> {
			match self.probes.lock().unwrap().pop().flatten() {
				Some(true) => Ok((true, "me".into())),
				Some(false) => Ok((false, "other".into())),
				None => Err(LeaderError::Db(DbErr::Custom("unreachable".into()))),
			}
		}
	}

	#[derive(Default)]
	struct CountingSupervisor {
		starts: AtomicUsize,
		stops: AtomicUsize,
		running: AtomicBool,
		overlapped: AtomicBool,
		fail_migration: bool,
	}

	#[async_trait]
	impl TermSupervisor for CountingSupervisor {
		async fn start_term(&self) -> Result<(), TermError> {
			if self.fail_migration {
				return Err(TermError::Migration(DbErr::Migration("broken".into())));
			}

			if self.running.swap(true, Ordering::SeqCst) {
				self.overlapped.store(true, Ordering::SeqCst);
			}
			self.starts.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}

		async fn stop_term(&self) {
			self.running.store(false, Ordering::SeqCst);
			self.stops.fetch_add(1, Ordering::SeqCst);
		}
	}

	fn gate(provider: Arc<ScriptedProvider>, supervisor: Arc<CountingSupervisor>) -> LeadershipGate {
		LeadershipGate::new(provider, supervisor, Duration::from_millis(5))
	}

	#[tokio::test]
	async fn test_transitions() {
		let provider = ScriptedProvider::new(&[
			Some(false),
			Some(true),
			Some(true),
			Some(false),
			Some(true),
		]);
		let supervisor = Arc::new(CountingSupervisor::default());
		let mut gate = gate(provider, supervisor.clone());

		assert_eq!(gate.tick().await.unwrap(), Role::Follower);
		assert_eq!(gate.leader(), "other");
		assert_eq!(gate.tick().await.unwrap(), Role::Leader);
		assert_eq!(gate.tick().await.unwrap(), Role::Leader);
		assert_eq!(gate.tick().await.unwrap(), Role::Follower);
		assert_eq!(gate.tick().await.unwrap(), Role::Leader);

		assert_eq!(supervisor.starts.load(Ordering::SeqCst), 2);
		assert_eq!(supervisor.stops.load(Ordering::SeqCst), 1);
		assert!(!supervisor.overlapped.load(Ordering::SeqCst));
	}

	#[tokio::test]
	async fn test_probe_error_keeps_role() {
		let provider = ScriptedProvider::new(&[Some(true), None, Some(true)]);
		let supervisor = Arc::new(CountingSupervisor::default());
		let mut gate = gate(provider, supervisor.clone());

		assert_eq!(gate.tick().await.unwrap(), Role::Leader);
		assert_eq!(gate.tick().await.unwrap(), Role::Leader);
		assert_eq!(gate.tick().await.unwrap(), Role::Leader);

		assert_eq!(supervisor.starts.load(Ordering::SeqCst), 1);
		assert_eq!(supervisor.stops.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_migration_failure_is_fatal() {
		let provider = ScriptedProvider::new(&[Some(true), Some(true)]);
		let supervisor = Arc::new(CountingSupervisor {
			fail_migration: true,
			..Default::default()
		});

		let err = gate(provider, supervisor)
			.run(CancellationToken::new())
			.await
			.unwrap_err();

		assert!(matches!(err, GateError::Migration(_)));
	}

	#[tokio::test]
	async fn test_shutdown_stops_running_term() {
		let provider = ScriptedProvider::new(&[Some(true); 64]);
		let supervisor = Arc::new(CountingSupervisor::default());
		let shutdown = CancellationToken::new();

		let handle = tokio::spawn(gate(provider, supervisor.clone()).run(shutdown.clone()));

		tokio::time::sleep(Duration::from_millis(20)).await;
		shutdown.cancel();
		handle.await.unwrap().unwrap();

		assert_eq!(supervisor.starts.load(Ordering::SeqCst), 1);
		assert_eq!(supervisor.stops.load(Ordering::SeqCst), 1);
		assert!(!supervisor.running.load(Ordering::SeqCst));
	}
}
