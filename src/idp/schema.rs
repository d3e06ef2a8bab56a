//! Typed response schema shared by the login and refresh endpoints.
//!
//! Both endpoints answer `{status, message, data: {token, user}}`. Required fields that are
//! missing or mistyped fail deserialization (with the failing path reported through
//! `serde_path_to_error`) instead of surfacing as empty values later on.

// self
use crate::{
	_prelude::*,
	auth::{Identity, PermissionSet, RoleName, UserId},
};

/// Top-level body returned by the IdP.
#[derive(Debug, Deserialize)]
pub(crate) struct IdpEnvelope {
	pub(crate) status: ResponseStatus,
	#[serde(default)]
	pub(crate) message: Option<String>,
	#[serde(default)]
	pub(crate) data: Option<IdpPayload>,
}
impl IdpEnvelope {
	/// Returns the payload only when the body reports success.
	pub(crate) fn into_success(self) -> Result<IdpPayload, Option<String>> {
		match (self.status.is_success(), self.data) {
			(true, Some(data)) => Ok(data),
			_ => Err(self.message),
		}
	}
}

/// `data` member of a successful body.
#[derive(Debug, Deserialize)]
pub(crate) struct IdpPayload {
	pub(crate) token: String,
	pub(crate) user: UserRecord,
}

/// `status` member; IdP deployments report it as a flag, a label, or an HTTP-like code.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ResponseStatus {
	Flag(bool),
	Code(i64),
	Label(String),
}
impl ResponseStatus {
	pub(crate) fn is_success(&self) -> bool {
		match self {
			Self::Flag(flag) => *flag,
			Self::Code(code) => (200..300).contains(code),
			Self::Label(label) =>
				label.eq_ignore_ascii_case("success") || label.eq_ignore_ascii_case("ok"),
		}
	}
}

/// `user` member, converted into an [`Identity`].
#[derive(Debug, Deserialize)]
pub(crate) struct UserRecord {
	id: UserId,
	username: String,
	role: RoleName,
	#[serde(alias = "displayName", alias = "display_name")]
	name: String,
	#[serde(default)]
	permissions: PermissionSet,
}
impl From<UserRecord> for Identity {
	fn from(record: UserRecord) -> Self {
		Self {
			id: record.id,
			username: record.username,
			role: record.role,
			display_name: record.name,
			permissions: record.permissions,
		}
	}
}
