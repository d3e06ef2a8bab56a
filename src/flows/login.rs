//! Credential login flow.
//!
//! [`SessionBroker::authenticate`] exchanges a username/password pair for a [`Session`]. The
//! caller only learns that the credentials were invalid, never which part was wrong.

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenPair},
	flows::SessionBroker,
	http::IdpHttpClient,
	idp::TransportErrorMapper,
	obs::{FlowKind, FlowOutcome, FlowSpan},
	provider::AdmissionDecision,
	session::Session,
};

impl<C, M> SessionBroker<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Authenticates the credentials against the IdP login endpoint.
	///
	/// Empty fields are rejected without a network call. A non-success response, a response
	/// without a refresh cookie, and an identity the provider strategy does not admit all map to
	/// [`Error::InvalidCredentials`]. Transport failures keep their own variants so callers can
	/// tell an outage from a typo.
	pub async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::start(KIND, "authenticate").with_user(credentials.username.trim());
		let result = span
			.instrument(async move {
				if credentials.is_incomplete() {
					return Err(Error::invalid_credentials("username and password are required"));
				}

				let exchange = self.idp().login(credentials).await?;

				if let AdmissionDecision::Deny { reason } = self.strategy.admit(&exchange.identity) {
					#[cfg(feature = "tracing")]
					tracing::info!(
						user = exchange.identity.username.as_str(),
						reason = reason.as_str(),
						"Login denied by provider strategy."
					);
					#[cfg(not(feature = "tracing"))]
					let _ = reason;

					return Err(Error::invalid_credentials("role is not admitted"));
				}

				let refresh_token = exchange
					.refresh_cookie
					.map(|cookie| cookie.into_secret())
					.ok_or_else(|| {
						Error::invalid_credentials("login response did not set a refresh token")
					})?;
				let tokens = TokenPair::new(exchange.access_token, Some(refresh_token));

				Ok(Session::new(exchange.identity, tokens))
			})
			.await;

		span.finish(if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure });

		result
	}
}
