//! Downstream projection of a session: `{user, accessToken, refreshToken, error?}`.
//!
//! Consumers treat a present `error` as "force re-authentication" and its absence as "the
//! access token is usable", however close to expiry it may be.

// self
use crate::{
	_prelude::*,
	auth::{Identity, TokenSecret},
	cookie,
	session::{Session, SessionErrorKind},
};

/// Externally consumed view of a [`Session`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEnvelope {
	/// Authenticated identity.
	pub user: Identity,
	/// Access token attached as `Authorization: Bearer`.
	pub access_token: TokenSecret,
	/// Refresh token attached as a cookie.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
	/// Present only when the session can no longer be used.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<SessionErrorKind>,
}
impl SessionEnvelope {
	/// `Authorization` header value.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.access_token.expose())
	}

	/// `Cookie` header value carrying the refresh token under `cookie_name`.
	pub fn refresh_cookie(&self, cookie_name: &str) -> Option<String> {
		self.refresh_token.as_ref().map(|secret| cookie::cookie_header(cookie_name, secret))
	}

	/// Returns `true` when callers must send the user back to the login form.
	pub fn requires_reauthentication(&self) -> bool {
		self.error.is_some()
	}
}
impl From<&Session> for SessionEnvelope {
	fn from(session: &Session) -> Self {
		Self {
			user: session.identity.clone(),
			access_token: session.tokens.access_token().clone(),
			refresh_token: session.tokens.refresh_token().cloned(),
			error: session.error,
		}
	}
}
