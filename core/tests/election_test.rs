//! Leadership tests
//!
//! Gates driven by real lease providers and pipeline supervisors sharing one store.

mod helpers;

use std::{
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Arc,
	},
	time::Duration,
};

use async_trait::async_trait;
use helpers::*;
use rc_core::{
	context::AppContext,
	infra::{
		db::entities::{ch_device, vm},
		election::{
			LeadershipGate, LeaseLeadership, Role, StandaloneLeadership, TermError,
			TermSupervisor,
		},
	},
	recorder::{
		cloud::CloudSnapshot, source::StaticSource, supervisor::PipelineSupervisor, Scope,
	},
};
use sea_orm::EntityTrait;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

const PROBE: Duration = Duration::from_secs(1);

async fn wait_for<F, Fut>(mut condition: F) -> bool
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = bool>,
{
	for _ in 0..100 {
		if condition().await {
			return true;
		}
		sleep(Duration::from_millis(20)).await;
	}
	false
}

fn supervisor(ctx: &AppContext, source: Arc<StaticSource>) -> Arc<PipelineSupervisor> {
	Arc::new(PipelineSupervisor::new(ctx.clone(), source))
}

/// Terms running across every node of a test, and the most ever seen at once
#[derive(Default)]
struct Terms {
	active: AtomicUsize,
	peak: AtomicUsize,
}

/// Counts the terms of one node into the shared [`Terms`]
struct Tracked {
	inner: Arc<PipelineSupervisor>,
	terms: Arc<Terms>,
	running: AtomicBool,
}

impl Tracked {
	fn new(inner: Arc<PipelineSupervisor>, terms: Arc<Terms>) -> Arc<Self> {
		Arc::new(Self {
			inner,
			terms,
			running: AtomicBool::new(false),
		})
	}
}

#[async_trait]
impl TermSupervisor for Tracked {
	async fn start_term(&self) -> Result<(), TermError> {
		self.inner.start_term().await?;
		if !self.running.swap(true, Ordering::SeqCst) {
			let active = self.terms.active.fetch_add(1, Ordering::SeqCst) + 1;
			self.terms.peak.fetch_max(active, Ordering::SeqCst);
		}
		Ok(())
	}

	async fn stop_term(&self) {
		self.inner.stop_term().await;
		if self.running.swap(false, Ordering::SeqCst) {
			self.terms.active.fetch_sub(1, Ordering::SeqCst);
		}
	}
}

#[tokio::test]
async fn test_leader_runs_pipeline_until_term_stops() {
	let db = Arc::new(store().await);
	let ctx = AppContext {
		config: Arc::new(config()),
		db: db.clone(),
	};

	let source = Arc::new(StaticSource::default());
	source
		.set(
			Scope::domain(DOMAIN),
			CloudSnapshot {
				vpcs: vec![vpc("v-1", "default")],
				vms: vec![vm("m-1", "web", "v-1")],
				..Default::default()
			},
		)
		.await;

	let supervisor = supervisor(&ctx, source);
	let mut gate = LeadershipGate::new(
		Arc::new(StandaloneLeadership::new("test")),
		supervisor.clone(),
		PROBE,
	);

	assert_eq!(gate.tick().await.unwrap(), Role::Leader);
	assert!(supervisor.is_running().await);

	let conn = db.conn().clone();
	assert!(
		wait_for(|| {
			let conn = conn.clone();
			async move { !ch_device::Entity::find().all(&conn).await.unwrap().is_empty() }
		})
		.await,
		"first pass never projected the vm"
	);

	let caches = supervisor.caches().await.unwrap();
	assert_eq!(
		caches.scopes().await,
		vec![Scope::domain(DOMAIN), Scope::sub_domain(DOMAIN, SUB_DOMAIN)]
	);
	assert!(caches
		.surrogate_id(&Scope::domain(DOMAIN), rc_core::recorder::ResourceType::Vm, "m-1")
		.await
		.is_some());

	// One recorder per scope
	assert_eq!(supervisor.actors().await.len(), 2);

	supervisor.stop_term().await;
	assert!(!supervisor.is_running().await);
	assert!(supervisor.caches().await.is_none());

	// Stopped term, no more writes
	vm::Entity::delete_many().exec(db.conn()).await.unwrap();
	sleep(Duration::from_millis(50)).await;
	assert!(vm::Entity::find().all(db.conn()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_only_lease_holder_runs_pipeline() {
	let db = Arc::new(store().await);
	let ctx = AppContext {
		config: Arc::new(config()),
		db: db.clone(),
	};
	let source = Arc::new(StaticSource::default());
	let terms = Arc::new(Terms::default());

	let lease_a = Arc::new(LeaseLeadership::new(db.conn().clone(), "a", Duration::from_secs(60)));
	let lease_b = Arc::new(LeaseLeadership::new(db.conn().clone(), "b", Duration::from_secs(60)));

	let supervisor_a = supervisor(&ctx, source.clone());
	let supervisor_b = supervisor(&ctx, source);

	let mut gate_a = LeadershipGate::new(
		lease_a,
		Tracked::new(supervisor_a.clone(), terms.clone()),
		PROBE,
	);
	let mut gate_b = LeadershipGate::new(
		lease_b,
		Tracked::new(supervisor_b.clone(), terms.clone()),
		PROBE,
	);

	assert_eq!(gate_a.tick().await.unwrap(), Role::Leader);
	assert_eq!(gate_b.tick().await.unwrap(), Role::Follower);
	assert_eq!(gate_b.leader(), "a");

	for _ in 0..3 {
		gate_a.tick().await.unwrap();
		gate_b.tick().await.unwrap();
		assert!(supervisor_a.is_running().await);
		assert!(!supervisor_b.is_running().await);
	}

	// Handover: a shuts down, stopping its term before giving the lease up
	let shutdown = CancellationToken::new();
	let stopped = tokio::spawn(gate_a.run(shutdown.clone()));
	sleep(Duration::from_millis(20)).await;
	assert_eq!(gate_b.tick().await.unwrap(), Role::Follower);

	shutdown.cancel();
	stopped.await.unwrap().unwrap();
	assert!(!supervisor_a.is_running().await);

	assert_eq!(gate_b.tick().await.unwrap(), Role::Leader);
	assert!(supervisor_b.is_running().await);

	assert_eq!(terms.active.load(Ordering::SeqCst), 1);
	assert_eq!(terms.peak.load(Ordering::SeqCst), 1);

	supervisor_b.stop_term().await;
}
