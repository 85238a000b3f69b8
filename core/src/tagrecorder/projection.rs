//! Projections of canonical rows into `ch_*` tables
//!
//! Every device kind lands in `ch_device` through a [`DeviceProjection`], the remaining named
//! resources each have their own id keyed table fed by a [`NamedProjection`]. A source row may
//! be listed under several device types, each one is a row of its own.

use std::{fmt::Debug, marker::PhantomData, sync::Arc};

use sea_orm::{
	sea_query::Condition, ActiveModelBehavior, ActiveModelTrait, ColumnTrait, FromQueryResult,
	IntoActiveModel, Value,
};

use crate::{
	infra::db::entities::{
		ch_az, ch_device, ch_network, ch_pod_cluster, ch_region, ch_vpc, CanonicalEntity,
		ProjectionEntity,
	},
	recorder::{
		field::FieldsUpdate,
		updater::{self, Reconcilable},
		DeviceType,
	},
};

use super::{display_name, icon::IconMap, Ownership};

pub type SourceRow<P> = <<P as Projection>::Source as Reconcilable>::Row;
pub type SourceEntity<P> = <<P as Projection>::Source as Reconcilable>::Entity;

/// How rows of one resource type are projected into one `ch_*` table.
pub trait Projection: Send + Sync + 'static {
	type Source: Reconcilable;
	type Target: ProjectionEntity<Model = Self::TargetRow, ActiveModel = Self::TargetActive>;
	type TargetRow: Clone
		+ Debug
		+ PartialEq
		+ FromQueryResult
		+ IntoActiveModel<Self::TargetActive>
		+ Send
		+ Sync
		+ 'static;
	type TargetActive: ActiveModelTrait<Entity = Self::Target>
		+ ActiveModelBehavior
		+ Send
		+ Sync
		+ 'static;

	fn name(&self) -> &str;

	/// Rows of the target table this projection is responsible for, covering every key
	/// [`Projection::source_to_target`] can produce
	fn owned(&self) -> Condition;

	fn source_name<'r>(&self, row: &'r SourceRow<Self>) -> &'r str;

	/// Target rows a source row maps to, soft deleted sources get a suffixed name
	fn source_to_target(&self, ownership: &Ownership, row: &SourceRow<Self>) -> Vec<Self::TargetRow>;

	/// Target columns to rewrite after `update`, empty when nothing tracked changed
	fn updated_columns(
		&self,
		update: &FieldsUpdate,
		row: &SourceRow<Self>,
	) -> Vec<(<Self::Target as sea_orm::EntityTrait>::Column, Value)>;
}

/// Resources that carry a display name
pub trait NamedSource: Reconcilable {
	/// Changed-field name of the type code icons are narrowed by
	const SUB_TYPE_FIELD: Option<&'static str> = None;

	fn name(row: &Self::Row) -> &str;

	fn sub_type(row: &Self::Row) -> Option<i32> {
		let _ = row;
		None
	}
}

pub trait DeviceSource: NamedSource {
	/// Device types every row is listed under
	const DEVICE_TYPES: &'static [DeviceType];
}

macro_rules! named_source {
	($($marker:ident),* $(,)?) => {
		$(
			impl NamedSource for updater::$marker {
				fn name(row: &Self::Row) -> &str {
					&row.name
				}
			}
		)*
	};
}

named_source!(Region, Az, Vpc, Network, Vrouter, Lb, PodCluster, PodService);

impl NamedSource for updater::Host {
	const SUB_TYPE_FIELD: Option<&'static str> = Some("htype");

	fn name(row: &Self::Row) -> &str {
		&row.name
	}

	fn sub_type(row: &Self::Row) -> Option<i32> {
		Some(row.htype)
	}
}

impl NamedSource for updater::Vm {
	const SUB_TYPE_FIELD: Option<&'static str> = Some("htype");

	fn name(row: &Self::Row) -> &str {
		&row.name
	}

	fn sub_type(row: &Self::Row) -> Option<i32> {
		Some(row.htype)
	}
}

impl DeviceSource for updater::Host {
	const DEVICE_TYPES: &'static [DeviceType] = &[DeviceType::Host];
}

impl DeviceSource for updater::Vm {
	const DEVICE_TYPES: &'static [DeviceType] = &[DeviceType::Vm];
}

impl DeviceSource for updater::Vrouter {
	const DEVICE_TYPES: &'static [DeviceType] = &[DeviceType::Vrouter];
}

impl DeviceSource for updater::Lb {
	const DEVICE_TYPES: &'static [DeviceType] = &[DeviceType::Lb];
}

impl DeviceSource for updater::PodCluster {
	const DEVICE_TYPES: &'static [DeviceType] = &[DeviceType::PodCluster];
}

impl DeviceSource for updater::PodService {
	const DEVICE_TYPES: &'static [DeviceType] = &[DeviceType::PodService, DeviceType::Service];
}

fn is_deleted<S: Reconcilable>(row: &S::Row) -> bool {
	S::Entity::deleted_at_of(row).is_some()
}

fn common_updates<S: NamedSource, C: ColumnTrait>(
	update: &FieldsUpdate,
	row: &S::Row,
	name_column: C,
	icon_column: C,
	icon: impl FnOnce() -> i32,
) -> Vec<(C, Value)> {
	let mut columns = Vec::new();

	if update.changes.contains("name") {
		columns.push((name_column, Value::from(S::name(row).to_string())));
	}

	if let Some(field) = S::SUB_TYPE_FIELD {
		if update.changes.contains(field) {
			columns.push((icon_column, Value::from(icon())));
		}
	}

	columns
}

pub struct DeviceProjection<S> {
	name: String,
	icons: Arc<IconMap>,
	_marker: PhantomData<fn() -> S>,
}

impl<S: DeviceSource> DeviceProjection<S> {
	pub fn new(icons: Arc<IconMap>) -> Self {
		Self {
			name: format!("ch_device:{}", S::RESOURCE_TYPE),
			icons,
			_marker: PhantomData,
		}
	}

	fn icon(&self, row: &S::Row) -> i32 {
		self.icons.lookup(S::RESOURCE_TYPE.as_ref(), S::sub_type(row))
	}
}

impl<S: DeviceSource> Projection for DeviceProjection<S> {
	type Source = S;
	type Target = ch_device::Entity;
	type TargetRow = ch_device::Model;
	type TargetActive = ch_device::ActiveModel;

	fn name(&self) -> &str {
		&self.name
	}

	fn owned(&self) -> Condition {
		let codes = S::DEVICE_TYPES.iter().map(|device_type| device_type.code());
		Condition::all().add(ch_device::Column::Devicetype.is_in(codes))
	}

	fn source_name<'r>(&self, row: &'r S::Row) -> &'r str {
		S::name(row)
	}

	fn source_to_target(&self, ownership: &Ownership, row: &S::Row) -> Vec<ch_device::Model> {
		let name = display_name(S::name(row), is_deleted::<S>(row));
		let icon_id = self.icon(row);

		S::DEVICE_TYPES
			.iter()
			.map(|device_type| ch_device::Model {
				devicetype: device_type.code(),
				deviceid: S::Entity::id_of(row),
				name: name.clone(),
				uid: S::Entity::lcuuid_of(row).to_string(),
				icon_id,
				team_id: ownership.team_id,
				domain_id: ownership.domain_id,
				sub_domain_id: ownership.sub_domain_id,
			})
			.collect()
	}

	fn updated_columns(
		&self,
		update: &FieldsUpdate,
		row: &S::Row,
	) -> Vec<(ch_device::Column, Value)> {
		common_updates::<S, _>(
			update,
			row,
			ch_device::Column::Name,
			ch_device::Column::IconId,
			|| self.icon(row),
		)
	}
}

/// Id keyed `ch_*` tables sharing the same column set
pub trait NamedTarget: ProjectionEntity<Key = i32> {
	fn build(id: i32, name: String, uid: String, icon_id: i32, ownership: &Ownership) -> Self::Model;
}

macro_rules! named_target {
	($($table:ident),* $(,)?) => {
		$(
			impl NamedTarget for $table::Entity {
				fn build(
					id: i32,
					name: String,
					uid: String,
					icon_id: i32,
					ownership: &Ownership,
				) -> $table::Model {
					$table::Model {
						id,
						name,
						uid,
						icon_id,
						team_id: ownership.team_id,
						domain_id: ownership.domain_id,
						sub_domain_id: ownership.sub_domain_id,
					}
				}
			}
		)*
	};
}

named_target!(ch_vpc, ch_network, ch_az, ch_region, ch_pod_cluster);

pub struct NamedProjection<S, T> {
	name: String,
	icons: Arc<IconMap>,
	_marker: PhantomData<fn() -> (S, T)>,
}

impl<S: NamedSource, T: NamedTarget> NamedProjection<S, T> {
	pub fn new(icons: Arc<IconMap>) -> Self {
		Self {
			name: format!("ch_{}", S::RESOURCE_TYPE),
			icons,
			_marker: PhantomData,
		}
	}

	fn icon(&self, row: &S::Row) -> i32 {
		self.icons.lookup(S::RESOURCE_TYPE.as_ref(), S::sub_type(row))
	}
}

impl<S, T> Projection for NamedProjection<S, T>
where
	S: NamedSource,
	T: NamedTarget,
	T::Model: Clone
		+ Debug
		+ PartialEq
		+ FromQueryResult
		+ IntoActiveModel<T::ActiveModel>
		+ Send
		+ Sync
		+ 'static,
	T::ActiveModel: ActiveModelBehavior + Send + Sync + 'static,
{
	type Source = S;
	type Target = T;
	type TargetRow = T::Model;
	type TargetActive = T::ActiveModel;

	fn name(&self) -> &str {
		&self.name
	}

	fn owned(&self) -> Condition {
		Condition::all()
	}

	fn source_name<'r>(&self, row: &'r S::Row) -> &'r str {
		S::name(row)
	}

	fn source_to_target(&self, ownership: &Ownership, row: &S::Row) -> Vec<T::Model> {
		vec![T::build(
			S::Entity::id_of(row),
			display_name(S::name(row), is_deleted::<S>(row)),
			S::Entity::lcuuid_of(row).to_string(),
			self.icon(row),
			ownership,
		)]
	}

	fn updated_columns(&self, update: &FieldsUpdate, row: &S::Row) -> Vec<(T::Column, Value)> {
		common_updates::<S, _>(
			update,
			row,
			T::name_column(),
			T::icon_column(),
			|| self.icon(row),
		)
	}
}

pub type VpcProjection = NamedProjection<updater::Vpc, ch_vpc::Entity>;
pub type NetworkProjection = NamedProjection<updater::Network, ch_network::Entity>;
pub type AzProjection = NamedProjection<updater::Az, ch_az::Entity>;
pub type RegionProjection = NamedProjection<updater::Region, ch_region::Entity>;
pub type PodClusterProjection = NamedProjection<updater::PodCluster, ch_pod_cluster::Entity>;
