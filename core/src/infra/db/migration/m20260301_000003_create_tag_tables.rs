//! Tag projection tables
//!
//! `ch_device` is keyed by device type and device id, the other projections by the source id.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const ID_KEYED: &[&str] = &["ch_vpc", "ch_network", "ch_az", "ch_region", "ch_pod_cluster"];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		let mut device = Table::create();
		device
			.table(ChDevice::Table)
			.if_not_exists()
			.col(ColumnDef::new(ChDevice::Devicetype).integer().not_null())
			.col(ColumnDef::new(ChDevice::Deviceid).integer().not_null())
			.primary_key(
				Index::create()
					.col(ChDevice::Devicetype)
					.col(ChDevice::Deviceid),
			);
		manager
			.create_table(with_tag_columns(&mut device).to_owned())
			.await?;

		for table in ID_KEYED {
			let mut create = Table::create();
			create
				.table(Alias::new(*table))
				.if_not_exists()
				.col(
					ColumnDef::new(Tag::Id)
						.integer()
						.not_null()
						.primary_key(),
				);
			manager
				.create_table(with_tag_columns(&mut create).to_owned())
				.await?;
		}

		Ok(())
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		for table in ID_KEYED {
			manager
				.drop_table(Table::drop().table(Alias::new(*table)).to_owned())
				.await?;
		}
		manager
			.drop_table(Table::drop().table(ChDevice::Table).to_owned())
			.await?;

		Ok(())
	}
}

fn with_tag_columns(table: &mut TableCreateStatement) -> &mut TableCreateStatement {
	table
		.col(ColumnDef::new(Tag::Name).string().not_null())
		.col(ColumnDef::new(Tag::Uid).string().not_null().default(""))
		.col(ColumnDef::new(Tag::IconId).integer().not_null().default(0))
		.col(ColumnDef::new(Tag::TeamId).integer().not_null())
		.col(ColumnDef::new(Tag::DomainId).integer().not_null())
		.col(
			ColumnDef::new(Tag::SubDomainId)
				.integer()
				.not_null()
				.default(0),
		)
}

#[derive(DeriveIden)]
enum ChDevice {
	Table,
	Devicetype,
	Deviceid,
}

#[derive(DeriveIden)]
enum Tag {
	Id,
	Name,
	Uid,
	IconId,
	TeamId,
	DomainId,
	SubDomainId,
}
