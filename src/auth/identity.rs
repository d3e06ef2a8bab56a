//! Authenticated identities and the ephemeral credentials that produce them.

// self
use crate::{
	_prelude::*,
	auth::{PermissionSet, RoleName, UserId},
};

/// Identity reported by the identity provider for an authenticated subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
	/// Provider-assigned subject identifier.
	pub id: UserId,
	/// Login name.
	pub username: String,
	/// Role used for admission and route checks.
	pub role: RoleName,
	/// Human-readable name shown in the dashboard.
	pub display_name: String,
	/// Granted permission labels.
	pub permissions: PermissionSet,
}
impl Identity {
	/// Returns `true` if the identity carries the provided role (ASCII case-insensitive).
	pub fn has_role(&self, role: &str) -> bool {
		self.role.matches(role)
	}
}

/// Username/password pair submitted to the login endpoint; never persisted.
#[derive(Clone)]
pub struct Credentials {
	/// Login name.
	pub username: String,
	password: String,
}
impl Credentials {
	/// Bundles a username/password pair.
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self { username: username.into(), password: password.into() }
	}

	/// Returns the password. Callers must avoid logging this string.
	pub fn expose_password(&self) -> &str {
		&self.password
	}

	/// Returns `true` when either field is empty after trimming the username.
	pub fn is_incomplete(&self) -> bool {
		self.username.trim().is_empty() || self.password.is_empty()
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}
