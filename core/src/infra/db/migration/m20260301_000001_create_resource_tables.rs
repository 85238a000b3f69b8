//! Canonical resource tables
//!
//! Every resource table shares the same bookkeeping columns: surrogate id, unique lcuuid,
//! owning domain and sub domain lcuuids, timestamps, and the soft delete marker.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

enum Kind {
	Text,
	Int,
}

const TABLES: &[(&str, &[(&str, Kind)])] = &[
	("region", &[("name", Kind::Text), ("label", Kind::Text)]),
	(
		"az",
		&[("name", Kind::Text), ("label", Kind::Text), ("region", Kind::Text)],
	),
	(
		"vpc",
		&[
			("name", Kind::Text),
			("label", Kind::Text),
			("cidr", Kind::Text),
			("region", Kind::Text),
		],
	),
	(
		"network",
		&[
			("name", Kind::Text),
			("label", Kind::Text),
			("cidr", Kind::Text),
			("net_type", Kind::Int),
			("vpc_id", Kind::Int),
			("az", Kind::Text),
			("region", Kind::Text),
		],
	),
	(
		"host",
		&[
			("name", Kind::Text),
			("ip", Kind::Text),
			("htype", Kind::Int),
			("vcpu_num", Kind::Int),
			("mem_total", Kind::Int),
			("az", Kind::Text),
			("region", Kind::Text),
		],
	),
	(
		"vm",
		&[
			("name", Kind::Text),
			("label", Kind::Text),
			("htype", Kind::Int),
			("state", Kind::Int),
			("launch_server", Kind::Text),
			("vpc_id", Kind::Int),
			("az", Kind::Text),
			("region", Kind::Text),
		],
	),
	(
		"vrouter",
		&[
			("name", Kind::Text),
			("label", Kind::Text),
			("gw_launch_server", Kind::Text),
			("vpc_id", Kind::Int),
			("region", Kind::Text),
		],
	),
	(
		"lb",
		&[
			("name", Kind::Text),
			("label", Kind::Text),
			("model", Kind::Int),
			("vip", Kind::Text),
			("vpc_id", Kind::Int),
			("region", Kind::Text),
		],
	),
	("lb_vm_connection", &[("lb_id", Kind::Int), ("vm_id", Kind::Int)]),
	(
		"peer_connection",
		&[
			("name", Kind::Text),
			("local_vpc_id", Kind::Int),
			("remote_vpc_id", Kind::Int),
			("local_region_id", Kind::Int),
			("remote_region_id", Kind::Int),
		],
	),
	(
		"pod_cluster",
		&[
			("name", Kind::Text),
			("version", Kind::Text),
			("cluster_name", Kind::Text),
			("vpc_id", Kind::Int),
			("az", Kind::Text),
			("region", Kind::Text),
		],
	),
	(
		"pod_service",
		&[
			("name", Kind::Text),
			("label", Kind::Text),
			("service_type", Kind::Int),
			("cluster_ip", Kind::Text),
			("pod_cluster_id", Kind::Int),
			("vpc_id", Kind::Int),
			("az", Kind::Text),
			("region", Kind::Text),
		],
	),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		for (table, columns) in TABLES {
			let mut create = Table::create();
			create
				.table(Alias::new(*table))
				.if_not_exists()
				.col(
					ColumnDef::new(Resource::Id)
						.integer()
						.not_null()
						.auto_increment()
						.primary_key(),
				)
				.col(
					ColumnDef::new(Resource::Lcuuid)
						.string()
						.not_null()
						.unique_key(),
				);

			for (column, kind) in *columns {
				let mut def = ColumnDef::new(Alias::new(*column));
				match kind {
					Kind::Text => def.string().not_null().default(""),
					Kind::Int => def.integer().not_null().default(0),
				};
				create.col(&mut def);
			}

			create
				.col(ColumnDef::new(Resource::Domain).string().not_null())
				.col(
					ColumnDef::new(Resource::SubDomain)
						.string()
						.not_null()
						.default(""),
				)
				.col(
					ColumnDef::new(Resource::CreatedAt)
						.timestamp_with_time_zone()
						.not_null(),
				)
				.col(
					ColumnDef::new(Resource::UpdatedAt)
						.timestamp_with_time_zone()
						.not_null(),
				)
				.col(ColumnDef::new(Resource::DeletedAt).timestamp_with_time_zone());

			manager.create_table(create.to_owned()).await?;

			// Cache rebuilds and domain cleanup filter on the owning scope
			manager
				.create_index(
					Index::create()
						.name(format!("idx_{table}_domain"))
						.table(Alias::new(*table))
						.col(Resource::Domain)
						.col(Resource::SubDomain)
						.if_not_exists()
						.to_owned(),
				)
				.await?;
		}

		Ok(())
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		for (table, _) in TABLES.iter().rev() {
			manager
				.drop_table(Table::drop().table(Alias::new(*table)).to_owned())
				.await?;
		}

		Ok(())
	}
}

#[derive(DeriveIden)]
enum Resource {
	Id,
	Lcuuid,
	Domain,
	SubDomain,
	CreatedAt,
	UpdatedAt,
	DeletedAt,
}
