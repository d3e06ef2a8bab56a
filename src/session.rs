//! Authenticated sessions, their error taxonomy, and external updates.
//!
//! A [`Session`] is created by [`SessionBroker::authenticate`](crate::flows::SessionBroker::authenticate)
//! and advanced once per inbound request by
//! [`SessionBroker::evaluate`](crate::flows::SessionBroker::evaluate). The decision logic lives
//! in [`machine`] as synchronous functions; the downstream projection lives in [`envelope`].

pub mod envelope;
pub mod machine;

pub use envelope::*;
pub use machine::*;

// self
use crate::{
	_prelude::*,
	auth::{Identity, TokenPair, TokenSecret},
};

/// Error recorded on a session after a refresh or login could not produce usable tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionErrorKind {
	/// No refresh token was available to attempt a refresh.
	MissingRefreshToken,
	/// The identity provider rejected the refresh token.
	RefreshUnauthorized,
	/// Transient or unclassified refresh failure with no valid access token to fall back on.
	RefreshFailed,
	/// Username/password rejected, role not admitted, or no refresh token issued at login.
	InvalidCredentials,
}
impl SessionErrorKind {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			SessionErrorKind::MissingRefreshToken => "MissingRefreshToken",
			SessionErrorKind::RefreshUnauthorized => "RefreshUnauthorized",
			SessionErrorKind::RefreshFailed => "RefreshFailed",
			SessionErrorKind::InvalidCredentials => "InvalidCredentials",
		}
	}

	/// Returns `true` when no refresh can repair the session and the user must log in again.
	///
	/// [`SessionErrorKind::RefreshFailed`] is the only recoverable kind: the next evaluation
	/// retries the refresh.
	pub const fn is_terminal(self) -> bool {
		!matches!(self, SessionErrorKind::RefreshFailed)
	}
}
impl Display for SessionErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Identity plus token pair for one authenticated user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	/// Identity reported by the IdP on the last login or refresh.
	pub identity: Identity,
	/// Current access/refresh tokens.
	pub tokens: TokenPair,
	/// Error left by the last evaluation, if it could not keep the session usable.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<SessionErrorKind>,
	/// Instant of the last successful refresh; `None` for sessions straight from login.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refreshed_at: Option<OffsetDateTime>,
}
impl Session {
	/// Creates an error-free session from a login exchange.
	pub fn new(identity: Identity, tokens: TokenPair) -> Self {
		Self { identity, tokens, error: None, refreshed_at: None }
	}

	/// Returns `true` when callers may attach the access token at `now`.
	pub fn is_usable_at(&self, now: OffsetDateTime) -> bool {
		self.error.is_none() && self.tokens.is_usable_at(now)
	}

	/// Returns `true` when the session carries a terminal error.
	pub fn requires_reauthentication(&self) -> bool {
		self.error.is_some_and(SessionErrorKind::is_terminal)
	}

	/// Projects the session onto the shape consumed by downstream API callers.
	pub fn envelope(&self) -> SessionEnvelope {
		SessionEnvelope::from(self)
	}
}

/// Caller-initiated patch merged into a session without expiry evaluation.
///
/// A supplied access token re-derives the expiry; omitted fields keep their previous values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
	/// Replacement access token.
	#[serde(default)]
	pub access_token: Option<String>,
	/// Replacement refresh token.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
	/// Replacement identity.
	#[serde(default)]
	pub identity: Option<Identity>,
}
impl SessionUpdate {
	/// Sets the replacement access token.
	pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
		self.access_token = Some(access_token.into());

		self
	}

	/// Sets the replacement refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(refresh_token));

		self
	}

	/// Sets the replacement identity.
	pub fn with_identity(mut self, identity: Identity) -> Self {
		self.identity = Some(identity);

		self
	}

	/// Returns `true` when the update carries no field.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none() && self.refresh_token.is_none() && self.identity.is_none()
	}
}
