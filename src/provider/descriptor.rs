//! Identity-provider descriptor shared by every flow.
//!
//! The descriptor is built once from the IdP base URL and injected into the broker at
//! construction; nothing in the crate reads process-wide configuration.

/// Builder API for assembling descriptors.
pub mod builder;
/// Bounded retry/backoff policy for refresh calls.
pub mod retry;

pub use builder::*;
pub use retry::*;

// self
use crate::_prelude::*;

/// Identity-provider endpoints used by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdpEndpoint {
	/// `POST /login` credential exchange.
	Login,
	/// `GET /refresh-token` refresh exchange.
	Refresh,
}
impl IdpEndpoint {
	/// Returns a stable label suitable for log fields and error messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			IdpEndpoint::Login => "login",
			IdpEndpoint::Refresh => "refresh",
		}
	}
}
impl Display for IdpEndpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Absolute endpoint URLs derived from the base URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpEndpoints {
	/// Credential exchange endpoint.
	pub login: Url,
	/// Refresh exchange endpoint.
	pub refresh: Url,
}

/// Immutable identity-provider configuration consumed by flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpDescriptor {
	/// Base URL every endpoint is resolved against.
	pub base_url: Url,
	/// Endpoint definitions.
	pub endpoints: IdpEndpoints,
	/// Name of the cookie carrying the refresh token.
	pub refresh_cookie: String,
	/// Lead time before expiry at which sessions are refreshed proactively.
	pub refresh_threshold: Duration,
	/// Upper bound applied to every IdP request.
	pub request_timeout: Duration,
	/// How long a completed refresh is shared with callers presenting the same refresh
	/// token.
	pub singleflight_window: Duration,
	/// Retry policy for refresh calls.
	pub retry: RetryPolicy,
}
impl IdpDescriptor {
	/// Default proactive refresh lead time.
	pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::minutes(5);
	/// Default request timeout.
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(10);
	/// Default single-flight sharing window.
	pub const DEFAULT_SINGLEFLIGHT_WINDOW: Duration = Duration::seconds(30);
	/// Default refresh cookie name.
	pub const DEFAULT_REFRESH_COOKIE: &'static str = "refresh_token";

	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> IdpDescriptorBuilder {
		IdpDescriptorBuilder::new(base_url)
	}

	/// Returns the absolute URL for an endpoint.
	pub fn endpoint(&self, endpoint: IdpEndpoint) -> &Url {
		match endpoint {
			IdpEndpoint::Login => &self.endpoints.login,
			IdpEndpoint::Refresh => &self.endpoints.refresh,
		}
	}
}
