//! Domain registry and leader lease tables

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(Domain::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(Domain::Id)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(
						ColumnDef::new(Domain::Lcuuid)
							.string()
							.not_null()
							.unique_key(),
					)
					.col(ColumnDef::new(Domain::Name).string().not_null())
					.col(ColumnDef::new(Domain::TeamId).integer().not_null())
					.col(
						ColumnDef::new(Domain::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(Domain::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(SubDomain::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(SubDomain::Id)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(
						ColumnDef::new(SubDomain::Lcuuid)
							.string()
							.not_null()
							.unique_key(),
					)
					.col(ColumnDef::new(SubDomain::Domain).string().not_null())
					.col(ColumnDef::new(SubDomain::Name).string().not_null())
					.col(ColumnDef::new(SubDomain::TeamId).integer().not_null())
					.col(
						ColumnDef::new(SubDomain::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(SubDomain::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(ControllerLease::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(ControllerLease::Name)
							.string()
							.not_null()
							.primary_key(),
					)
					.col(ColumnDef::new(ControllerLease::Holder).string().not_null())
					.col(
						ColumnDef::new(ControllerLease::ExpiresAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(ControllerLease::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		Ok(())
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(ControllerLease::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(SubDomain::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(Domain::Table).to_owned())
			.await?;

		Ok(())
	}
}

#[derive(DeriveIden)]
enum Domain {
	Table,
	Id,
	Lcuuid,
	Name,
	TeamId,
	CreatedAt,
	UpdatedAt,
}

#[derive(DeriveIden)]
enum SubDomain {
	Table,
	Id,
	Lcuuid,
	Domain,
	Name,
	TeamId,
	CreatedAt,
	UpdatedAt,
}

#[derive(DeriveIden)]
enum ControllerLease {
	Table,
	Name,
	Holder,
	ExpiresAt,
	UpdatedAt,
}
