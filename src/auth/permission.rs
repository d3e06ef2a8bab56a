//! Permission modeling for identities returned by the identity provider.

// std
use std::{collections::BTreeSet, slice::Iter};
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError, ser::SerializeSeq};
// self
use crate::_prelude::*;

/// Errors emitted when validating permissions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum PermissionError {
	/// Blank permission entries are not allowed.
	#[error("Permission entries cannot be blank.")]
	Blank,
}

/// Normalized set of permission labels.
///
/// Entries are trimmed, deduplicated, and sorted, so two identities granted the same
/// permissions in a different order compare equal.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct PermissionSet {
	permissions: Arc<[String]>,
}
impl PermissionSet {
	/// Creates a normalized permission set from any iterator.
	pub fn new<I, S>(permissions: I) -> Result<Self, PermissionError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Ok(Self { permissions: normalize(permissions)? })
	}

	/// Number of distinct permissions.
	pub fn len(&self) -> usize {
		self.permissions.len()
	}

	/// Returns true if no permissions are granted.
	pub fn is_empty(&self) -> bool {
		self.permissions.is_empty()
	}

	/// Returns true if the set grants the provided permission.
	pub fn contains(&self, permission: &str) -> bool {
		self.permissions.binary_search_by(|candidate| candidate.as_str().cmp(permission)).is_ok()
	}

	/// Returns true if every provided permission is granted.
	pub fn contains_all<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> bool {
		required.into_iter().all(|permission| self.contains(permission))
	}

	/// Iterator over normalized permissions.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.permissions.iter().map(|s| s.as_str())
	}

	/// Returns the underlying slice of permission strings.
	pub fn as_slice(&self) -> &[String] {
		&self.permissions
	}
}
impl Debug for PermissionSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("PermissionSet").field(&self.permissions).finish()
	}
}

/// Iterator over permission strings.
pub struct PermissionIter<'a> {
	inner: Iter<'a, String>,
}
impl<'a> Iterator for PermissionIter<'a> {
	type Item = &'a str;

	fn next(&mut self) -> Option<Self::Item> {
		self.inner.next().map(|s| s.as_str())
	}
}
impl<'a> IntoIterator for &'a PermissionSet {
	type IntoIter = PermissionIter<'a>;
	type Item = &'a str;

	fn into_iter(self) -> Self::IntoIter {
		PermissionIter { inner: self.permissions.iter() }
	}
}
impl TryFrom<Vec<String>> for PermissionSet {
	type Error = PermissionError;

	fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl Serialize for PermissionSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut seq = serializer.serialize_seq(Some(self.permissions.len()))?;

		for permission in self.permissions.iter() {
			seq.serialize_element(permission)?;
		}

		seq.end()
	}
}
impl<'de> Deserialize<'de> for PermissionSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let values = <Vec<String>>::deserialize(deserializer)?;

		PermissionSet::new(values).map_err(DeError::custom)
	}
}

fn normalize<I, S>(permissions: I) -> Result<Arc<[String]>, PermissionError>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	let mut set = BTreeSet::new();

	for permission in permissions {
		let owned: String = permission.into();
		let trimmed = owned.trim();

		if trimmed.is_empty() {
			return Err(PermissionError::Blank);
		}

		set.insert(trimmed.to_owned());
	}

	Ok(Arc::from(set.into_iter().collect::<Vec<_>>()))
}
