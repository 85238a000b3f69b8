//! Shared harness for recorder integration tests
//!
//! Builds an in-memory store, a bus with every projection plus recording subscribers and a
//! pass driver for a single domain scope.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rc_core::{
	config::{DomainConfig, RecorderConfig, SubDomainConfig},
	infra::{
		db::{
			entities::{host, vm, vpc},
			Database,
		},
		event::{
			ChangeMessage, PubSub, PubSubBuilder, ResourceChange, ResourceSubscriber,
			SubscriberResult,
		},
	},
	recorder::{
		cache::{Cache, CacheManager},
		cloud::{self, CloudSnapshot},
		domain::DomainRecorder,
		registry::DomainRegistry,
		updater::PassReport,
		Metadata, ResourceType,
	},
	tagrecorder::{self, check::ProjectionCheck},
};
use sea_orm::DatabaseConnection;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

pub const DOMAIN: &str = "d-1";
pub const SUB_DOMAIN: &str = "sd-1";

pub async fn store() -> Database {
	let db = Database::memory().await.expect("in-memory store");
	db.migrate().await.expect("migrations");
	db
}

/// One domain `d-1` owned by team 2, with a sub domain `sd-1` owned by team 4
pub fn config() -> RecorderConfig {
	let mut config = RecorderConfig::default();
	config.controller.node_id = "test".into();
	config.recorder.unresolved_warn_every = 3;
	config.tagrecorder.check_interval_secs = 0;
	config.domains = vec![DomainConfig {
		lcuuid: DOMAIN.into(),
		name: "aliyun".into(),
		team_id: 2,
		sub_domains: vec![SubDomainConfig {
			lcuuid: SUB_DOMAIN.into(),
			name: "k8s".into(),
			team_id: 4,
		}],
	}];
	config
}

/// Keeps every message of one topic, in delivery order
pub struct Recording<M> {
	messages: Mutex<Vec<ChangeMessage<M>>>,
}

impl<M> Default for Recording<M> {
	fn default() -> Self {
		Self {
			messages: Mutex::new(Vec::new()),
		}
	}
}

impl<M: Clone> Recording<M> {
	pub fn messages(&self) -> Vec<ChangeMessage<M>> {
		self.messages.lock().unwrap().clone()
	}

	pub fn kinds(&self) -> Vec<&'static str> {
		self.messages.lock().unwrap().iter().map(|m| m.kind()).collect()
	}

	pub fn clear(&self) {
		self.messages.lock().unwrap().clear();
	}

	pub fn deleted_lcuuids(&self) -> Vec<String> {
		self.messages
			.lock()
			.unwrap()
			.iter()
			.filter_map(|message| match &message.change {
				ResourceChange::Deleted { lcuuids, .. } => Some(lcuuids.clone()),
				_ => None,
			})
			.flatten()
			.collect()
	}
}

#[async_trait]
impl<M: Clone + Send + Sync + 'static> ResourceSubscriber<M> for Recording<M> {
	fn name(&self) -> &str {
		"recording"
	}

	async fn on_message(&self, message: &ChangeMessage<M>) -> SubscriberResult {
		self.messages.lock().unwrap().push(message.clone());
		Ok(())
	}
}

pub struct Harness {
	pub db: DatabaseConnection,
	pub config: RecorderConfig,
	pub pubsub: Arc<PubSub>,
	pub caches: Arc<CacheManager>,
	pub metadata: Metadata,
	/// Every configured scope, as returned by the registry
	pub scopes: Vec<Metadata>,
	pub cache: Arc<RwLock<Cache>>,
	pub recorder: DomainRecorder,
	pub checks: Vec<Arc<dyn ProjectionCheck>>,
	pub vpcs: Arc<Recording<vpc::Model>>,
	pub hosts: Arc<Recording<host::Model>>,
	pub vms: Arc<Recording<vm::Model>>,
}

impl Harness {
	pub async fn new() -> Self {
		Self::with_config(config()).await
	}

	pub async fn with_config(config: RecorderConfig) -> Self {
		Self::on_store(store().await.conn().clone(), config).await
	}

	/// Harness for the domain scope of `config` on an existing store
	pub async fn on_store(db: DatabaseConnection, config: RecorderConfig) -> Self {
		Self::build(db, config, |_| {}).await
	}

	/// `subscribe` registers additional subscribers ahead of the projections
	pub async fn build(
		db: DatabaseConnection,
		config: RecorderConfig,
		subscribe: impl FnOnce(&mut PubSubBuilder),
	) -> Self {
		let vpcs = Arc::new(Recording::default());
		let hosts = Arc::new(Recording::default());
		let vms = Arc::new(Recording::default());

		let mut builder = PubSub::builder();
		subscribe(&mut builder);
		let checks = tagrecorder::register(&mut builder, &db, &config);
		builder
			.subscribe::<vpc::Model>(ResourceType::Vpc, vpcs.clone())
			.subscribe::<host::Model>(ResourceType::Host, hosts.clone())
			.subscribe::<vm::Model>(ResourceType::Vm, vms.clone());
		let pubsub = Arc::new(builder.build());

		let caches = Arc::new(CacheManager::default());
		let scopes = DomainRegistry::new(&db, &config)
			.sync(&pubsub, &caches)
			.await
			.expect("registry sync");

		let metadata = scopes
			.iter()
			.find(|metadata| metadata.domain_lcuuid == DOMAIN && metadata.sub_domain_id.is_none())
			.cloned()
			.expect("a domain scope");

		let cache = caches
			.insert(Cache::new(metadata.clone(), config.recorder.unresolved_warn_every))
			.await;
		let recorder =
			DomainRecorder::new(db.clone(), pubsub.clone(), cache.clone(), &config.recorder).await;
		recorder.load_cache().await.expect("cache load");

		Self {
			db,
			config,
			pubsub,
			caches,
			metadata,
			scopes,
			cache,
			recorder,
			checks,
			vpcs,
			hosts,
			vms,
		}
	}

	pub fn with_order(mut self, order: &[ResourceType]) -> Self {
		self.recorder = self
			.recorder
			.with_order(order, &self.config.recorder)
			.expect("valid order");
		self
	}

	/// Cache and pass driver of another configured scope, sharing this harness' bus
	pub async fn scope_recorder(&self, metadata: &Metadata) -> DomainRecorder {
		let cache = self
			.caches
			.insert(Cache::new(metadata.clone(), self.config.recorder.unresolved_warn_every))
			.await;
		let recorder =
			DomainRecorder::new(self.db.clone(), self.pubsub.clone(), cache, &self.config.recorder)
				.await;
		recorder.load_cache().await.expect("cache load");
		recorder
	}

	/// Domain level scope of another configured domain
	pub fn domain_metadata(&self, lcuuid: &str) -> Metadata {
		self.scopes
			.iter()
			.find(|metadata| metadata.domain_lcuuid == lcuuid && metadata.sub_domain_id.is_none())
			.cloned()
			.expect("domain scope")
	}

	pub fn sub_domain_metadata(&self) -> Metadata {
		self.scopes
			.iter()
			.find(|metadata| metadata.sub_domain_lcuuid.as_deref() == Some(SUB_DOMAIN))
			.cloned()
			.expect("sub domain scope")
	}

	pub async fn pass(&self, snapshot: &CloudSnapshot) -> PassReport {
		self.recorder
			.run_pass(snapshot, &CancellationToken::new())
			.await
			.expect("pass")
	}

	pub fn clear_recordings(&self) {
		self.vpcs.clear();
		self.hosts.clear();
		self.vms.clear();
	}
}

pub fn vpc(lcuuid: &str, name: &str) -> cloud::Vpc {
	cloud::Vpc {
		lcuuid: lcuuid.into(),
		name: name.into(),
		cidr: "10.0.0.0/16".into(),
		region_lcuuid: "r-1".into(),
		..Default::default()
	}
}

pub fn host(lcuuid: &str, name: &str, ip: &str) -> cloud::Host {
	cloud::Host {
		lcuuid: lcuuid.into(),
		name: name.into(),
		ip: ip.into(),
		htype: 3,
		vcpu_num: 8,
		mem_total: 16384,
		az_lcuuid: "az-1".into(),
		region_lcuuid: "r-1".into(),
	}
}

pub fn vm(lcuuid: &str, name: &str, vpc_lcuuid: &str) -> cloud::Vm {
	cloud::Vm {
		lcuuid: lcuuid.into(),
		name: name.into(),
		htype: 1,
		state: 4,
		vpc_lcuuid: vpc_lcuuid.into(),
		az_lcuuid: "az-1".into(),
		region_lcuuid: "r-1".into(),
		..Default::default()
	}
}

pub fn pod_cluster(lcuuid: &str, name: &str, vpc_lcuuid: &str) -> cloud::PodCluster {
	cloud::PodCluster {
		lcuuid: lcuuid.into(),
		name: name.into(),
		version: "1.29".into(),
		cluster_name: name.into(),
		vpc_lcuuid: vpc_lcuuid.into(),
		az_lcuuid: "az-1".into(),
		region_lcuuid: "r-1".into(),
	}
}

pub fn pod_service(lcuuid: &str, name: &str, cluster_lcuuid: &str, vpc_lcuuid: &str) -> cloud::PodService {
	cloud::PodService {
		lcuuid: lcuuid.into(),
		name: name.into(),
		service_type: 1,
		cluster_ip: "10.96.0.10".into(),
		pod_cluster_lcuuid: cluster_lcuuid.into(),
		vpc_lcuuid: vpc_lcuuid.into(),
		az_lcuuid: "az-1".into(),
		region_lcuuid: "r-1".into(),
		..Default::default()
	}
}

pub async fn run_pass(recorder: &DomainRecorder, snapshot: &CloudSnapshot) -> PassReport {
	recorder
		.run_pass(snapshot, &CancellationToken::new())
		.await
		.expect("pass")
}
