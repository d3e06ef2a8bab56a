//! Refresh-token orchestration with single-flight slots, bounded backoff, and degraded mode.
//!
//! [`SessionBroker::refresh`] exchanges the session's refresh token for a new access token.
//! Concurrent calls presenting the same refresh token acquire one per-fingerprint slot: the
//! first caller contacts the IdP, and callers arriving within the single-flight window reuse
//! its rotated session (or its rejection) instead of rotating the token a second time. Any
//! other failure reaches only the callers already queued behind the attempt that produced it.
//! A refreshed identity must still pass [`ProviderStrategy::admit`].
//! Retryable failures back off according to the descriptor's [`RetryPolicy`]; a 401 is final.
//! When a refresh fails for any reason other than an explicit rejection while the held
//! access token is still unexpired, the session is retained and a degraded signal is emitted.
//!
//! [`ProviderStrategy::admit`]: crate::provider::ProviderStrategy::admit
//! [`RetryPolicy`]: crate::provider::RetryPolicy

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::time::Instant;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	cookie::RefreshCookie,
	flows::{
		SessionBroker,
		common::{SharedRefresh, SharedVerdict},
	},
	http::IdpHttpClient,
	idp::TransportErrorMapper,
	obs::{FlowKind, FlowOutcome, FlowSpan},
	provider::AdmissionDecision,
	session::{Session, SessionErrorKind},
};

/// Successful result of [`SessionBroker::refresh`].
#[derive(Debug)]
pub enum RefreshOutcome {
	/// The IdP issued a new access token; the refresh token rotated if a cookie was returned.
	Rotated(Session),
	/// The refresh failed but the held access token is still unexpired, so the session was
	/// kept as is.
	Retained {
		/// Unchanged session.
		session: Session,
		/// Failure that was absorbed.
		cause: Error,
	},
}
impl RefreshOutcome {
	/// Session to continue with.
	pub fn session(&self) -> &Session {
		match self {
			RefreshOutcome::Rotated(session) | RefreshOutcome::Retained { session, .. } => session,
		}
	}

	/// Consumes the outcome, returning the session to continue with.
	pub fn into_session(self) -> Session {
		match self {
			RefreshOutcome::Rotated(session) | RefreshOutcome::Retained { session, .. } => session,
		}
	}

	/// Returns `true` when the tokens were replaced.
	pub fn is_rotated(&self) -> bool {
		matches!(self, RefreshOutcome::Rotated(_))
	}
}

impl<C, M> SessionBroker<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Refreshes the session's access token.
	///
	/// Returns [`Error::MissingRefreshToken`] without a network call when the session holds no
	/// refresh token, and [`Error::RefreshUnauthorized`] when the IdP rejects it or the refreshed
	/// identity is no longer admitted by the provider strategy. Any other failure becomes
	/// [`RefreshOutcome::Retained`] while the held access token is valid at `now`, and is
	/// returned as is otherwise.
	pub async fn refresh(&self, session: &Session, now: OffsetDateTime) -> Result<RefreshOutcome> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::start(KIND, "refresh").with_user(session.identity.username.as_str());
		let result = span
			.instrument(async move {
				self.refresh_metrics.record_attempt();

				let Some(refresh_token) = session.tokens.refresh_token() else {
					self.refresh_metrics.record_failure();

					return Err(Error::MissingRefreshToken);
				};

				match self.rotate_single_flight(session, refresh_token, now).await {
					Ok(rotated) => {
						self.refresh_metrics.record_success();

						Ok(RefreshOutcome::Rotated(rotated))
					},
					Err(err)
						if err.session_error_kind() == SessionErrorKind::RefreshFailed
							&& session.tokens.is_usable_at(now) =>
					{
						self.refresh_metrics.record_degraded();

						#[cfg(feature = "tracing")]
						tracing::warn!(
							user = session.identity.username.as_str(),
							error = %err,
							"Refresh failed; continuing with the current access token."
						);

						let mut session = session.clone();

						session.error = None;

						Ok(RefreshOutcome::Retained { session, cause: err })
					},
					Err(err) => {
						self.refresh_metrics.record_failure();

						Err(err)
					},
				}
			})
			.await;

		span.finish(match &result {
			Ok(RefreshOutcome::Rotated(_)) => FlowOutcome::Success,
			Ok(RefreshOutcome::Retained { .. }) => FlowOutcome::Degraded,
			Err(_) => FlowOutcome::Failure,
		});

		result
	}

	async fn rotate_single_flight(
		&self,
		session: &Session,
		refresh_token: &TokenSecret,
		now: OffsetDateTime,
	) -> Result<Session> {
		let window = self.descriptor.singleflight_window;
		let slot = self.refresh_coordinator().slot(&refresh_token.fingerprint(), window);
		let arrived = Instant::now();
		let mut shared = slot.lock().await;

		if let Some(previous) =
			shared.as_ref().filter(|previous| previous.is_reusable_by(arrived, window))
		{
			self.refresh_metrics.record_shared();

			return previous.verdict.to_result();
		}

		let result = self.rotate(session, refresh_token, now).await;
		let verdict = match &result {
			Ok(rotated) => SharedVerdict::Rotated(Box::new(rotated.clone())),
			Err(Error::RefreshUnauthorized) => SharedVerdict::Unauthorized,
			Err(err) => SharedVerdict::failed(err),
		};

		*shared = Some(SharedRefresh::new(verdict));

		result
	}

	async fn rotate(
		&self,
		session: &Session,
		refresh_token: &TokenSecret,
		now: OffsetDateTime,
	) -> Result<Session> {
		let policy = self.descriptor.retry;
		let mut completed = 0_u32;
		let exchange = loop {
			match self.idp().refresh(refresh_token).await {
				Ok(exchange) => break exchange,
				Err(err) => {
					completed += 1;

					if !err.is_retryable() || !policy.allows_retry(completed) {
						return Err(err);
					}

					let delay = policy.delay_for(completed, err.retry_after());

					#[cfg(feature = "tracing")]
					tracing::debug!(
						attempt = completed,
						delay_ms = i64::try_from(delay.whole_milliseconds()).unwrap_or(i64::MAX),
						error = %err,
						"Retrying refresh after a retryable failure."
					);

					if delay.is_positive() {
						tokio::time::sleep(std::time::Duration::try_from(delay).unwrap_or_default())
							.await;
					}
				},
			}
		};

		if let AdmissionDecision::Deny { reason } = self.strategy.admit(&exchange.identity) {
			#[cfg(feature = "tracing")]
			tracing::info!(
				user = exchange.identity.username.as_str(),
				reason = reason.as_str(),
				"Refreshed identity is no longer admitted."
			);
			#[cfg(not(feature = "tracing"))]
			let _ = reason;

			return Err(Error::RefreshUnauthorized);
		}

		let rotated_refresh = exchange.refresh_cookie.map(RefreshCookie::into_secret);

		Ok(Session {
			identity: exchange.identity,
			tokens: session.tokens.rotate(exchange.access_token, rotated_refresh),
			error: None,
			refreshed_at: Some(now),
		})
	}
}
