//! Access/refresh token pair with an expiry derived from the access token itself.

// self
use crate::{
	_prelude::*,
	auth::token::{
		codec::{self, decode_expiry},
		secret::TokenSecret,
	},
};

/// Lifecycle status of an access token relative to an instant and a refresh threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Expiry could not be decoded; treated as due for refresh and not known to be valid.
	Unknown,
	/// Token is valid beyond the refresh threshold.
	Valid,
	/// Token is still valid but inside the refresh threshold.
	NearExpiry,
	/// Token is past its expiry instant.
	Expired,
}

/// Access token, refresh token, and the access token's expiry.
///
/// The expiry is never supplied by callers: it is decoded from the access token's `exp`
/// claim whenever a pair is constructed or deserialized.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredTokenPair", into = "StoredTokenPair")]
pub struct TokenPair {
	access_token: TokenSecret,
	refresh_token: Option<TokenSecret>,
	access_token_expires_at_ms: Option<i64>,
}
impl TokenPair {
	/// Builds a pair, decoding the access token expiry. Blank refresh tokens are dropped.
	pub fn new(access_token: impl Into<String>, refresh_token: Option<TokenSecret>) -> Self {
		let access_token = TokenSecret::new(access_token);
		let access_token_expires_at_ms = decode_expiry(access_token.expose());

		Self {
			access_token,
			refresh_token: refresh_token.filter(|secret| !secret.is_blank()),
			access_token_expires_at_ms,
		}
	}

	/// Access token secret.
	pub fn access_token(&self) -> &TokenSecret {
		&self.access_token
	}

	/// Refresh token secret, if one is held.
	pub fn refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref()
	}

	/// Access token expiry in epoch milliseconds, when the `exp` claim decoded.
	pub fn access_token_expires_at_ms(&self) -> Option<i64> {
		self.access_token_expires_at_ms
	}

	/// Access token expiry as an instant, when the `exp` claim decoded.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.access_token_expires_at_ms.and_then(codec::millis_to_instant)
	}

	/// Returns `true` while the access token is known to be unexpired at `now`.
	pub fn is_usable_at(&self, now: OffsetDateTime) -> bool {
		self.access_token_expires_at_ms.is_some_and(|expires| codec::instant_to_millis(now) < expires)
	}

	/// Returns `true` when `now` has reached `expires_at - threshold` or the expiry is
	/// unknown.
	pub fn needs_refresh_at(&self, now: OffsetDateTime, threshold: Duration) -> bool {
		!matches!(self.status_at(now, threshold), TokenStatus::Valid)
	}

	/// Computes the lifecycle status at `now` for the provided refresh threshold.
	pub fn status_at(&self, now: OffsetDateTime, threshold: Duration) -> TokenStatus {
		let Some(expires) = self.access_token_expires_at_ms else {
			return TokenStatus::Unknown;
		};
		let now = codec::instant_to_millis(now);
		let threshold = i64::try_from(threshold.whole_milliseconds()).unwrap_or(i64::MAX);

		if now >= expires {
			TokenStatus::Expired
		} else if now < expires.saturating_sub(threshold) {
			TokenStatus::Valid
		} else {
			TokenStatus::NearExpiry
		}
	}

	/// Replaces the access token and, when supplied, the refresh token.
	///
	/// Rotation is optional per exchange: without a new refresh token the current one is
	/// kept.
	pub fn rotate(&self, access_token: impl Into<String>, refresh_token: Option<TokenSecret>) -> Self {
		let refresh_token =
			refresh_token.filter(|secret| !secret.is_blank()).or_else(|| self.refresh_token.clone());

		Self::new(access_token, refresh_token)
	}

	/// Replaces only the refresh token, keeping the access token and its expiry.
	pub fn with_refresh_token(mut self, refresh_token: TokenSecret) -> Self {
		if !refresh_token.is_blank() {
			self.refresh_token = Some(refresh_token);
		}

		self
	}
}
impl Debug for TokenPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenPair")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("access_token_expires_at_ms", &self.access_token_expires_at_ms)
			.finish()
	}
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTokenPair {
	access_token: TokenSecret,
	#[serde(default)]
	refresh_token: Option<TokenSecret>,
}
impl From<StoredTokenPair> for TokenPair {
	fn from(value: StoredTokenPair) -> Self {
		Self::new(value.access_token.expose(), value.refresh_token)
	}
}
impl From<TokenPair> for StoredTokenPair {
	fn from(value: TokenPair) -> Self {
		Self { access_token: value.access_token, refresh_token: value.refresh_token }
	}
}
