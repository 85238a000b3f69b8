//! Reconciliation pass tests
//!
//! Drives the pass driver of a single domain over successive snapshots and checks the
//! canonical rows, the cache, the published messages and the device projection.

mod helpers;

use helpers::*;
use pretty_assertions::assert_eq;
use rc_core::{
	config::DomainConfig,
	infra::{
		db::entities::{ch_device, host, vm, vpc},
		event::ResourceChange,
	},
	recorder::{
		cache::diffbase::{HostBase, VmBase, VpcBase},
		cloud::CloudSnapshot,
		field::FieldValue,
		updater, DeletionMode, DeviceType, ResourceType,
	},
};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing_test::traced_test;

fn snapshot() -> CloudSnapshot {
	CloudSnapshot {
		vpcs: vec![vpc("v-1", "default")],
		hosts: vec![host("h-1", "node-1", "192.168.0.1")],
		vms: vec![vm("m-1", "web", "v-1")],
		..Default::default()
	}
}

async fn device(harness: &Harness, device_type: DeviceType, id: i32) -> Option<ch_device::Model> {
	ch_device::Entity::find()
		.filter(ch_device::Column::Devicetype.eq(device_type.code()))
		.filter(ch_device::Column::Deviceid.eq(id))
		.one(&harness.db)
		.await
		.unwrap()
}

async fn vm_row(harness: &Harness, lcuuid: &str) -> Option<vm::Model> {
	vm::Entity::find()
		.filter(vm::Column::Lcuuid.eq(lcuuid))
		.one(&harness.db)
		.await
		.unwrap()
}

#[tokio::test]
async fn test_second_pass_over_same_snapshot_is_a_noop() {
	let harness = Harness::new().await;

	let first = harness.pass(&snapshot()).await;
	assert_eq!(first.added, 3);
	assert!(first.published > 0);

	harness.clear_recordings();

	let second = harness.pass(&snapshot()).await;
	assert!(second.is_noop(), "{second:?}");
	assert_eq!(second.published, 0);
	assert!(harness.vpcs.kinds().is_empty());
	assert!(harness.hosts.kinds().is_empty());
	assert!(harness.vms.kinds().is_empty());

	assert_eq!(vm::Entity::find().all(&harness.db).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cache_matches_store_after_pass() {
	let harness = Harness::new().await;
	harness.pass(&snapshot()).await;

	let mut changed = snapshot();
	changed.vms[0].state = 2;
	changed.hosts[0].vcpu_num = 16;
	harness.pass(&changed).await;

	let cache = harness.cache.read().await;

	for row in vpc::Entity::find().all(&harness.db).await.unwrap() {
		assert_eq!(cache.diff_bases.vpcs.get(&row.lcuuid), Some(&VpcBase::from(&row)));
		assert_eq!(cache.tool.id(ResourceType::Vpc, &row.lcuuid), Some(row.id));
	}

	for row in host::Entity::find().all(&harness.db).await.unwrap() {
		assert_eq!(cache.diff_bases.hosts.get(&row.lcuuid), Some(&HostBase::from(&row)));
		assert_eq!(cache.tool.host_id_by_ip(&row.ip), Some(row.id));
	}

	for row in vm::Entity::find().all(&harness.db).await.unwrap() {
		assert_eq!(cache.diff_bases.vms.get(&row.lcuuid), Some(&VmBase::from(&row)));
	}

	assert_eq!(cache.diff_bases.vms["m-1"].state, 2);
	assert_eq!(cache.sequence(), 2);
}

#[tokio::test]
#[traced_test]
async fn test_unresolved_reference_is_skipped_then_converges() {
	let harness = Harness::new().await.with_order(&[ResourceType::Vm, ResourceType::Vpc]);

	let snapshot = CloudSnapshot {
		vpcs: vec![vpc("v-1", "default")],
		vms: vec![vm("m-1", "web", "v-1")],
		..Default::default()
	};

	let first = harness.pass(&snapshot).await;
	assert_eq!(first.skipped, 1);
	assert_eq!(first.added, 1);
	assert!(vm_row(&harness, "m-1").await.is_none());
	assert!(logs_contain("Reference not resolved"));

	let second = harness.pass(&snapshot).await;
	assert_eq!(second.skipped, 0);
	assert_eq!(second.added, 1);

	let vpc_id = harness
		.caches
		.surrogate_id(&harness.metadata.scope(), ResourceType::Vpc, "v-1")
		.await
		.unwrap();
	assert_eq!(vm_row(&harness, "m-1").await.unwrap().vpc_id, vpc_id);
	assert_eq!(harness.cache.read().await.unresolved.pending(), 0);
}

#[tokio::test]
async fn test_host_rename_publishes_one_update() {
	let harness = Harness::new().await;
	harness.pass(&snapshot()).await;
	harness.clear_recordings();

	let mut renamed = snapshot();
	renamed.hosts[0].name = "node-2".into();
	let report = harness.pass(&renamed).await;
	assert_eq!(report.updated, 1);

	let messages = harness.hosts.messages();
	assert_eq!(messages.len(), 1);

	let ResourceChange::Updated { update, row } = &messages[0].change else {
		panic!("expected an update, got {:?}", messages[0].change);
	};
	assert_eq!(update.changes.len(), 1);
	let change = update.changes.get("name").unwrap();
	assert_eq!(change.old, FieldValue::from("node-1"));
	assert_eq!(change.new, FieldValue::from("node-2"));

	assert_eq!(
		harness
			.caches
			.get_entry::<updater::Host>(&harness.metadata.scope(), "h-1")
			.await
			.unwrap()
			.name,
		"node-2"
	);

	let projected = device(&harness, DeviceType::Host, row.id).await.unwrap();
	assert_eq!(projected.name, "node-2");
}

#[tokio::test]
async fn test_soft_deleted_vm_keeps_suffixed_projection() {
	let harness = Harness::new().await;
	harness.pass(&snapshot()).await;
	let id = vm_row(&harness, "m-1").await.unwrap().id;
	harness.clear_recordings();

	let mut without_vm = snapshot();
	without_vm.vms.clear();
	let report = harness.pass(&without_vm).await;

	assert_eq!(report.deleted, 1);
	assert_eq!(harness.vms.deleted_lcuuids(), vec!["m-1".to_string()]);
	assert!(harness.cache.read().await.diff_bases.vms.is_empty());
	assert!(vm_row(&harness, "m-1").await.unwrap().deleted_at.is_some());
	assert_eq!(
		device(&harness, DeviceType::Vm, id).await.unwrap().name,
		"web (deleted)"
	);

	// Already gone, nothing more to delete
	harness.clear_recordings();
	assert!(harness.pass(&without_vm).await.is_noop());
	assert!(harness.vms.kinds().is_empty());
}

#[tokio::test]
async fn test_hard_deleted_vm_loses_projection() {
	let mut config = config();
	config
		.recorder
		.deletion
		.insert("vm".into(), DeletionMode::Hard);
	let harness = Harness::with_config(config).await;

	harness.pass(&snapshot()).await;
	let id = vm_row(&harness, "m-1").await.unwrap().id;

	let mut without_vm = snapshot();
	without_vm.vms.clear();
	harness.pass(&without_vm).await;

	assert!(vm_row(&harness, "m-1").await.is_none());
	assert!(device(&harness, DeviceType::Vm, id).await.is_none());
	assert_eq!(harness.vms.deleted_lcuuids(), vec!["m-1".to_string()]);
}

#[tokio::test]
async fn test_revived_vm_keeps_its_id() {
	let harness = Harness::new().await;
	harness.pass(&snapshot()).await;
	let id = vm_row(&harness, "m-1").await.unwrap().id;

	let mut without_vm = snapshot();
	without_vm.vms.clear();
	harness.pass(&without_vm).await;

	let report = harness.pass(&snapshot()).await;
	assert_eq!(report.added, 1);

	let row = vm_row(&harness, "m-1").await.unwrap();
	assert_eq!(row.id, id);
	assert!(row.deleted_at.is_none());
	assert_eq!(device(&harness, DeviceType::Vm, id).await.unwrap().name, "web");
}

#[tokio::test]
async fn test_inserts_are_chunked_by_batch_size() {
	let mut config = config();
	config.recorder.batch_size = 2;
	let harness = Harness::with_config(config).await;

	let snapshot = CloudSnapshot {
		vpcs: (1..=5)
			.map(|i| vpc(&format!("v-{i}"), &format!("vpc-{i}")))
			.collect(),
		..Default::default()
	};

	let report = harness.pass(&snapshot).await;
	assert_eq!(report.added, 5);

	let batches = harness
		.vpcs
		.messages()
		.into_iter()
		.map(|message| match message.change {
			ResourceChange::Added(rows) => rows.len(),
			other => panic!("unexpected change {other:?}"),
		})
		.collect::<Vec<_>>();
	assert_eq!(batches, vec![2, 2, 1]);
}

#[tokio::test]
async fn test_failed_resource_type_is_left_untouched() {
	let harness = Harness::new().await;
	harness.pass(&snapshot()).await;

	let mut partial = snapshot();
	partial.vms.clear();
	partial.failed.insert(ResourceType::Vm);

	let report = harness.pass(&partial).await;
	assert!(report.is_noop());
	assert!(vm_row(&harness, "m-1").await.unwrap().deleted_at.is_none());
	assert!(harness.cache.read().await.diff_bases.vms.contains_key("m-1"));
}

#[tokio::test]
async fn test_cache_is_rebuilt_from_store() {
	let harness = Harness::new().await;
	harness.pass(&snapshot()).await;

	let restarted = Harness::on_store(harness.db.clone(), harness.config.clone()).await;
	harness.clear_recordings();

	assert!(restarted.pass(&snapshot()).await.is_noop());
	assert!(restarted.vms.kinds().is_empty());
	assert_eq!(
		restarted.cache.read().await.diff_bases.vms["m-1"],
		harness.cache.read().await.diff_bases.vms["m-1"]
	);
}

async fn execute(harness: &Harness, statement: &str) {
	harness.db.execute_unprepared(statement).await.unwrap();
}

#[tokio::test]
#[traced_test]
async fn test_rejected_insert_batch_is_retried_next_pass() {
	let harness = Harness::new().await;
	execute(
		&harness,
		"CREATE TRIGGER reject_vm BEFORE INSERT ON vm BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
	)
	.await;

	let first = harness.pass(&snapshot()).await;
	assert_eq!(first.failed_batches, 1);
	assert_eq!(first.added, 2);
	assert!(logs_contain("Failed to insert batch"));

	assert!(vm_row(&harness, "m-1").await.is_none());
	assert!(harness.vms.kinds().is_empty());
	assert_eq!(harness.vpcs.kinds(), vec!["added"]);
	assert_eq!(harness.hosts.kinds(), vec!["added"]);
	{
		let cache = harness.cache.read().await;
		assert!(cache.diff_bases.vms.is_empty());
		assert_eq!(cache.tool.id(ResourceType::Vm, "m-1"), None);
	}
	let vm_devices = ch_device::Entity::find()
		.filter(ch_device::Column::Devicetype.eq(DeviceType::Vm.code()))
		.all(&harness.db)
		.await
		.unwrap();
	assert!(vm_devices.is_empty());

	execute(&harness, "DROP TRIGGER reject_vm;").await;
	harness.clear_recordings();

	let second = harness.pass(&snapshot()).await;
	assert_eq!(second.failed_batches, 0);
	assert_eq!(second.added, 1);
	assert_eq!(harness.vms.kinds(), vec!["added"]);

	let row = vm_row(&harness, "m-1").await.unwrap();
	assert!(harness.cache.read().await.diff_bases.vms.contains_key("m-1"));
	assert_eq!(device(&harness, DeviceType::Vm, row.id).await.unwrap().name, "web");
}

#[tokio::test]
async fn test_rejected_update_batch_keeps_cache_and_retries() {
	let harness = Harness::new().await;
	harness.pass(&snapshot()).await;
	harness.clear_recordings();
	execute(
		&harness,
		"CREATE TRIGGER reject_host BEFORE UPDATE ON host BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
	)
	.await;

	let mut renamed = snapshot();
	renamed.hosts[0].name = "node-2".into();

	let first = harness.pass(&renamed).await;
	assert_eq!(first.failed_batches, 1);
	assert_eq!(first.updated, 0);
	assert!(harness.hosts.kinds().is_empty());
	assert_eq!(harness.cache.read().await.diff_bases.hosts["h-1"].name, "node-1");

	let row = host::Entity::find()
		.filter(host::Column::Lcuuid.eq("h-1"))
		.one(&harness.db)
		.await
		.unwrap()
		.unwrap();
	assert_eq!(row.name, "node-1");
	assert_eq!(device(&harness, DeviceType::Host, row.id).await.unwrap().name, "node-1");

	execute(&harness, "DROP TRIGGER reject_host;").await;

	let second = harness.pass(&renamed).await;
	assert_eq!(second.failed_batches, 0);
	assert_eq!(second.updated, 1);
	assert_eq!(harness.hosts.kinds(), vec!["updated"]);
	assert_eq!(harness.cache.read().await.diff_bases.hosts["h-1"].name, "node-2");
	assert_eq!(device(&harness, DeviceType::Host, row.id).await.unwrap().name, "node-2");
}

#[tokio::test]
#[traced_test]
async fn test_lcuuid_owned_by_another_domain_is_skipped() {
	let mut config = config();
	config.domains.push(DomainConfig {
		lcuuid: "d-2".into(),
		name: "aws".into(),
		team_id: 3,
		sub_domains: Vec::new(),
	});
	let harness = Harness::with_config(config).await;
	harness.pass(&snapshot()).await;
	let owned = vpc::Entity::find()
		.filter(vpc::Column::Lcuuid.eq("v-1"))
		.one(&harness.db)
		.await
		.unwrap()
		.unwrap();

	let other = harness.scope_recorder(&harness.domain_metadata("d-2")).await;
	let mut renamed = vpc("v-1", "stolen");
	renamed.cidr = "172.16.0.0/12".into();
	let report = run_pass(
		&other,
		&CloudSnapshot {
			vpcs: vec![renamed],
			..Default::default()
		},
	)
	.await;

	assert_eq!(report.added, 0);
	assert_eq!(report.skipped, 1);
	assert!(logs_contain("Lcuuid held by a live row of another scope"));

	let row = vpc::Entity::find_by_id(owned.id)
		.one(&harness.db)
		.await
		.unwrap()
		.unwrap();
	assert_eq!(row, owned);
	assert_eq!(
		harness
			.caches
			.surrogate_id(&harness.domain_metadata("d-2").scope(), ResourceType::Vpc, "v-1")
			.await,
		None
	);
	assert!(harness.cache.read().await.diff_bases.vpcs.contains_key("v-1"));
}

#[tokio::test]
async fn test_hard_delete_refreshes_a_surviving_row() {
	let mut config = config();
	config
		.recorder
		.deletion
		.insert("vm".into(), DeletionMode::Hard);
	let harness = Harness::with_config(config).await;

	let mut two_vms = snapshot();
	two_vms.vms.push(vm("m-2", "db", "v-1"));
	harness.pass(&two_vms).await;
	let before = vm_row(&harness, "m-1").await.unwrap().updated_at;

	tokio::time::sleep(std::time::Duration::from_millis(20)).await;
	harness.pass(&snapshot()).await;

	assert!(vm_row(&harness, "m-2").await.is_none());
	assert!(vm_row(&harness, "m-1").await.unwrap().updated_at > before);
}
