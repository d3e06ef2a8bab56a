//! Synchronous session state machine.
//!
//! `Fresh → Valid → NearExpiry → Refreshing → {Valid | Error}`. The functions here never
//! touch the network: [`plan`] picks the action for one evaluation, [`apply_update`] merges
//! an external patch, and [`settle`] folds a refresh result back into the session.

// self
use crate::{
	_prelude::*,
	auth::TokenStatus,
	flows::RefreshOutcome,
	session::{Session, SessionErrorKind, SessionUpdate},
};

/// Observable lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
	/// Issued by login, never refreshed, and outside the refresh threshold.
	Fresh,
	/// Outside the refresh threshold.
	Valid,
	/// Inside the refresh threshold, expired, or with an undecodable expiry.
	NearExpiry,
	/// A refresh for the session's refresh token is in flight.
	Refreshing,
	/// The session carries an error.
	Error,
}
impl SessionState {
	/// Derives the state of a session at `now`.
	///
	/// [`SessionState::Refreshing`] is never derived here since it depends on in-flight work;
	/// see [`SessionBroker::state`](crate::flows::SessionBroker::state).
	pub fn of(session: &Session, now: OffsetDateTime, threshold: Duration) -> Self {
		if session.error.is_some() {
			return SessionState::Error;
		}

		match session.tokens.status_at(now, threshold) {
			TokenStatus::Valid if session.refreshed_at.is_none() => SessionState::Fresh,
			TokenStatus::Valid => SessionState::Valid,
			TokenStatus::NearExpiry | TokenStatus::Expired | TokenStatus::Unknown =>
				SessionState::NearExpiry,
		}
	}

	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			SessionState::Fresh => "fresh",
			SessionState::Valid => "valid",
			SessionState::NearExpiry => "near_expiry",
			SessionState::Refreshing => "refreshing",
			SessionState::Error => "error",
		}
	}
}
impl Display for SessionState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Action taken by one evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvaluationAction {
	/// An external update was merged; expiry evaluation was skipped.
	Update,
	/// The session carries a terminal error; nothing was attempted.
	Halt,
	/// The access token is outside the refresh threshold; the session is returned unchanged.
	Reuse,
	/// A refresh was attempted.
	Refresh,
}
impl EvaluationAction {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			EvaluationAction::Update => "update",
			EvaluationAction::Halt => "halt",
			EvaluationAction::Reuse => "reuse",
			EvaluationAction::Refresh => "refresh",
		}
	}
}

/// Result of [`SessionBroker::evaluate`](crate::flows::SessionBroker::evaluate).
#[derive(Debug)]
pub struct Evaluation {
	/// Action the evaluation took.
	pub action: EvaluationAction,
	/// State of the returned session.
	pub state: SessionState,
	/// Session to persist; always the most recent tokens.
	pub session: Session,
	/// Refresh failure that was absorbed or recorded on the session, if any.
	pub failure: Option<Error>,
}

/// Chooses the action for one evaluation.
///
/// A recoverable [`SessionErrorKind::RefreshFailed`] always retries the refresh, while the
/// threshold comparison `now < expires_at - threshold` decides between reuse and refresh for
/// error-free sessions. The boundary itself refreshes.
pub fn plan(
	session: &Session,
	now: OffsetDateTime,
	threshold: Duration,
	update: Option<&SessionUpdate>,
) -> EvaluationAction {
	if update.is_some() {
		return EvaluationAction::Update;
	}

	match session.error {
		Some(kind) if kind.is_terminal() => EvaluationAction::Halt,
		Some(_) => EvaluationAction::Refresh,
		None if session.tokens.needs_refresh_at(now, threshold) => EvaluationAction::Refresh,
		None => EvaluationAction::Reuse,
	}
}

/// Merges an external update into the session.
///
/// A supplied access token re-derives the expiry; otherwise the previous expiry stays. The
/// session error is cleared once the update hands over a new refresh token or an access
/// token usable at `now`, and kept otherwise.
pub fn apply_update(mut session: Session, update: SessionUpdate, now: OffsetDateTime) -> Session {
	let SessionUpdate { access_token, refresh_token, identity } = update;
	let supplies_refresh_token = refresh_token.as_ref().is_some_and(|secret| !secret.is_blank());
	let supplies_access_token = access_token.is_some();

	if let Some(access_token) = access_token {
		session.tokens = session.tokens.rotate(access_token, refresh_token);
	} else if let Some(refresh_token) = refresh_token {
		session.tokens = session.tokens.with_refresh_token(refresh_token);
	}
	if let Some(identity) = identity {
		session.identity = identity;
	}
	if supplies_refresh_token || (supplies_access_token && session.tokens.is_usable_at(now)) {
		session.error = None;
	}

	session
}

/// Folds a refresh result into the session that triggered it.
///
/// Success replaces the session and clears the error. A [`SessionErrorKind::RefreshFailed`]
/// class failure leaves the previous session untouched and error-free while its access token
/// is still unexpired; once it has expired the error is recorded. Terminal failures are
/// always recorded.
pub fn settle(
	session: Session,
	now: OffsetDateTime,
	result: Result<RefreshOutcome>,
) -> (Session, Option<Error>) {
	match result {
		Ok(RefreshOutcome::Rotated(mut rotated)) => {
			rotated.error = None;

			(rotated, None)
		},
		Ok(RefreshOutcome::Retained { mut session, cause }) => {
			session.error = None;

			(session, Some(cause))
		},
		Err(err) => {
			let kind = err.session_error_kind();
			let mut session = session;

			if kind == SessionErrorKind::RefreshFailed && session.tokens.is_usable_at(now) {
				session.error = None;
			} else {
				session.error = Some(kind);
			}

			(session, Some(err))
		},
	}
}
