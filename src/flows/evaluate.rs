//! Per-request session evaluation.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	flows::SessionBroker,
	http::IdpHttpClient,
	idp::TransportErrorMapper,
	obs::{FlowKind, FlowOutcome, FlowSpan},
	session::{self, Evaluation, EvaluationAction, Session, SessionState, SessionUpdate},
};

impl<C, M> SessionBroker<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Advances the session for one inbound request.
	///
	/// An external `update` is merged without looking at expiry. Otherwise a session outside
	/// the refresh threshold is reused untouched, a session with a terminal error is returned
	/// as is, and everything else goes through [`SessionBroker::refresh`]. Failures never
	/// escape as `Err`: they are folded into [`Session::error`] (or absorbed) and reported via
	/// [`Evaluation::failure`].
	pub async fn evaluate(
		&self,
		session: Session,
		now: OffsetDateTime,
		update: Option<SessionUpdate>,
	) -> Evaluation {
		const KIND: FlowKind = FlowKind::Evaluate;

		let threshold = self.descriptor.refresh_threshold;
		let action = session::plan(&session, now, threshold, update.as_ref());
		let span =
			FlowSpan::start(KIND, action.as_str()).with_user(session.identity.username.as_str());
		let (session, failure) = span
			.instrument(async move {
				match (action, update) {
					(EvaluationAction::Update, Some(update)) =>
						(session::apply_update(session, update, now), None),
					(EvaluationAction::Halt, _) => {
						let failure = session.error.map(Error::SessionTerminated);

						(session, failure)
					},
					(EvaluationAction::Refresh, _) => {
						let result = self.refresh(&session, now).await;

						session::settle(session, now, result)
					},
					_ => (session, None),
				}
			})
			.await;
		let state = SessionState::of(&session, now, threshold);

		span.record_state(state);
		span.finish(match (&session.error, &failure) {
			(Some(_), _) => FlowOutcome::Failure,
			(None, Some(_)) => FlowOutcome::Degraded,
			(None, None) => FlowOutcome::Success,
		});

		Evaluation { action, state, session, failure }
	}

	/// Reports the session's state, including [`SessionState::Refreshing`] while a refresh for
	/// its refresh token is in flight on this broker.
	pub fn state(&self, session: &Session, now: OffsetDateTime) -> SessionState {
		let refreshing = session
			.tokens
			.refresh_token()
			.map(TokenSecret::fingerprint)
			.is_some_and(|fingerprint| self.refresh_coordinator().in_flight(&fingerprint));

		if refreshing && session.error.is_none() {
			return SessionState::Refreshing;
		}

		SessionState::of(session, now, self.descriptor.refresh_threshold)
	}
}
