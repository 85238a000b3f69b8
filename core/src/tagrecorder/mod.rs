//! Tag recorder
//!
//! Keeps the denormalized `ch_*` tables in step with the canonical store. Every projection is a
//! [`subscriber::SubscriberComponent`] fed by the recorder's event bus, and a periodic
//! [`check`] pass rebuilds whatever drifted while events were lost.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::{
	config::RecorderConfig,
	infra::event::PubSubBuilder,
	recorder::{updater, updater::Reconcilable, Metadata},
};

pub mod check;
pub mod icon;
pub mod projection;
pub mod subscriber;

use check::ProjectionCheck;
use icon::IconMap;
use projection::{
	AzProjection, DeviceProjection, NetworkProjection, PodClusterProjection, Projection,
	RegionProjection, SourceRow, VpcProjection,
};
use subscriber::SubscriberComponent;

const DELETED_SUFFIX: &str = " (deleted)";

/// Team and scope ids stamped on every projected row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
	pub team_id: i32,
	pub domain_id: i32,
	pub sub_domain_id: i32,
}

impl From<&Metadata> for Ownership {
	fn from(metadata: &Metadata) -> Self {
		Self {
			team_id: metadata.team_id,
			domain_id: metadata.domain_id,
			sub_domain_id: metadata.sub_domain_id_or_zero(),
		}
	}
}

pub(crate) fn display_name(name: &str, deleted: bool) -> String {
	if deleted {
		format!("{name}{DELETED_SUFFIX}")
	} else {
		name.to_string()
	}
}

struct Registrar<'a> {
	builder: &'a mut PubSubBuilder,
	db: &'a DatabaseConnection,
	config: &'a RecorderConfig,
	checks: Vec<Arc<dyn ProjectionCheck>>,
}

impl Registrar<'_> {
	fn add<P: Projection>(&mut self, projection: P) -> &mut Self {
		let resource_type = P::Source::RESOURCE_TYPE;
		let component = Arc::new(SubscriberComponent::new(
			projection,
			self.db.clone(),
			self.config.recorder.deletion_mode(resource_type),
		));

		debug!(projection = component.projection().name(), %resource_type, "Registering projection");

		self.builder
			.subscribe::<SourceRow<P>>(resource_type, component.clone())
			.subscribe_domain(component.clone());
		self.checks.push(component);

		self
	}
}

/// Subscribes every projection to the bus being built and returns them for consistency checks
pub fn register(
	builder: &mut PubSubBuilder,
	db: &DatabaseConnection,
	config: &RecorderConfig,
) -> Vec<Arc<dyn ProjectionCheck>> {
	let icons = Arc::new(IconMap::new(&config.tagrecorder.icons));
	let mut registrar = Registrar {
		builder,
		db,
		config,
		checks: Vec::new(),
	};

	registrar
		.add(DeviceProjection::<updater::Host>::new(icons.clone()))
		.add(DeviceProjection::<updater::Vm>::new(icons.clone()))
		.add(DeviceProjection::<updater::Vrouter>::new(icons.clone()))
		.add(DeviceProjection::<updater::Lb>::new(icons.clone()))
		.add(DeviceProjection::<updater::PodCluster>::new(icons.clone()))
		.add(DeviceProjection::<updater::PodService>::new(icons.clone()))
		.add(RegionProjection::new(icons.clone()))
		.add(AzProjection::new(icons.clone()))
		.add(VpcProjection::new(icons.clone()))
		.add(NetworkProjection::new(icons.clone()))
		.add(PodClusterProjection::new(icons));

	registrar.checks
}
