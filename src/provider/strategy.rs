//! Provider strategy hooks that admit identities and classify failed IdP responses.
//!
//! Flows stay HTTP-client agnostic: the hooks only see crate-owned data (identities, status
//! codes, message previews).

// self
use crate::{
	_prelude::*,
	auth::Identity,
	provider::descriptor::IdpEndpoint,
};

/// Strategy hook consulted by the login and refresh flows.
///
/// Implementors are required to be `Send + Sync`. Override only what you need: both hooks
/// have defaults matching [`DefaultProviderStrategy`].
pub trait ProviderStrategy: Send + Sync {
	/// Decides whether an identity the IdP accepted may hold a dashboard session.
	fn admit(&self, identity: &Identity) -> AdmissionDecision {
		DefaultProviderStrategy.admit(identity)
	}

	/// Maps a failed IdP response or transport failure onto the refresh taxonomy.
	fn classify_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		DefaultProviderStrategy.classify_error(ctx)
	}
}

/// Outcome of [`ProviderStrategy::admit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdmissionDecision {
	/// The identity may hold a session.
	Admit,
	/// The identity is refused even though the IdP accepted its credentials.
	Deny {
		/// Reason recorded in logs; never shown verbatim to the user.
		reason: String,
	},
}

/// Canonical failure categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// The IdP rejected the presented credential; re-authentication is required.
	Unauthorized,
	/// Availability failure that may succeed later.
	Transient,
	/// Any other non-success response.
	Rejected,
}

/// Context passed to strategies when classifying failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Endpoint associated with the failing request.
	pub endpoint: IdpEndpoint,
	/// HTTP status code returned by the IdP, when available.
	pub http_status: Option<u16>,
	/// `message` field of the IdP response body, when it parsed.
	pub message: Option<String>,
	/// Preview of the response body for non-JSON payloads.
	pub body_preview: Option<String>,
	/// Indicates whether the failure originated from the network/transport layer.
	pub network_error: bool,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context scoped to the provided endpoint.
	pub fn new(endpoint: IdpEndpoint) -> Self {
		Self { endpoint, http_status: None, message: None, body_preview: None, network_error: false }
	}

	/// Convenience constructor for transport-level/network failures.
	pub fn network_failure(endpoint: IdpEndpoint) -> Self {
		let mut ctx = Self::new(endpoint);

		ctx.network_error = true;

		ctx
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the IdP-supplied message.
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());

		self
	}

	/// Adds a truncated body preview.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}

	/// Human-readable summary used in error messages.
	pub fn summary(&self) -> String {
		let detail = self.message.as_deref().or(self.body_preview.as_deref()).unwrap_or("no detail");

		match self.http_status {
			Some(status) => format!("HTTP {status}: {detail}"),
			None => detail.to_owned(),
		}
	}
}

/// Default strategy: denies the restricted `agent` role and classifies failures by status.
///
/// Network failures and 408/429/5xx are transient, 401 is unauthorized, everything else is
/// a plain rejection.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl DefaultProviderStrategy {
	/// Role that may never hold a dashboard session.
	pub const RESTRICTED_ROLE: &'static str = "agent";
}
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-provider-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn admit(&self, identity: &Identity) -> AdmissionDecision {
		if identity.has_role(Self::RESTRICTED_ROLE) {
			AdmissionDecision::Deny { reason: format!("role `{}` is not admitted", identity.role) }
		} else {
			AdmissionDecision::Admit
		}
	}

	fn classify_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.network_error {
			return ProviderErrorKind::Transient;
		}

		classify_status(ctx.http_status)
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ProviderErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = body.chars().take(ProviderErrorContext::BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(401) => ProviderErrorKind::Unauthorized,
		Some(408 | 429) => ProviderErrorKind::Transient,
		Some(code) if code >= 500 => ProviderErrorKind::Transient,
		_ => ProviderErrorKind::Rejected,
	}
}
