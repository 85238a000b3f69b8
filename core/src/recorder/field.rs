//! Changed-field sets computed by the updaters

use sea_orm::Value;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
	Int(i64),
	Text(String),
}

impl FieldValue {
	pub fn as_text(&self) -> Option<&str> {
		match self {
			Self::Text(text) => Some(text),
			Self::Int(_) => None,
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Self::Int(int) => Some(*int),
			Self::Text(_) => None,
		}
	}
}

impl From<i32> for FieldValue {
	fn from(value: i32) -> Self {
		Self::Int(i64::from(value))
	}
}

impl From<String> for FieldValue {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}

impl From<&str> for FieldValue {
	fn from(value: &str) -> Self {
		Self::Text(value.to_string())
	}
}

impl From<FieldValue> for Value {
	fn from(value: FieldValue) -> Self {
		match value {
			FieldValue::Int(int) => int.into(),
			FieldValue::Text(text) => text.into(),
		}
	}
}

/// One column whose value differs between the stored row and the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
	pub field: &'static str,
	pub old: FieldValue,
	pub new: FieldValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldChanges(Vec<FieldChange>);

impl FieldChanges {
	/// Records `field` when `old` and `new` differ
	pub fn compare<T>(&mut self, field: &'static str, old: &T, new: &T) -> &mut Self
	where
		T: PartialEq + Clone + Into<FieldValue>,
	{
		if old != new {
			self.0.push(FieldChange {
				field,
				old: old.clone().into(),
				new: new.clone().into(),
			});
		}

		self
	}

	pub fn get(&self, field: &str) -> Option<&FieldChange> {
		self.0.iter().find(|change| change.field == field)
	}

	pub fn contains(&self, field: &str) -> bool {
		self.get(field).is_some()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = &FieldChange> {
		self.0.iter()
	}
}

/// Update applied to a single canonical row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldsUpdate {
	pub id: i32,
	pub lcuuid: String,
	pub changes: FieldChanges,
}
