//! Shared helpers for flow implementations (single-flight refresh slots, session teardown).

// std
use std::time::Instant;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::TransientError,
	flows::SessionBroker,
	http::IdpHttpClient,
	idp::TransportErrorMapper,
	provider::IdpEndpoint,
	session::Session,
};

/// Single-flight slot guarding one refresh token.
pub(crate) type RefreshSlot = Arc<AsyncMutex<Option<SharedRefresh>>>;

/// Verdict of a completed refresh that later callers holding the same refresh token may
/// reuse.
#[derive(Clone, Debug)]
pub(crate) struct SharedRefresh {
	pub(crate) completed_at: Instant,
	pub(crate) verdict: SharedVerdict,
}
impl SharedRefresh {
	pub(crate) fn new(verdict: SharedVerdict) -> Self {
		Self { completed_at: Instant::now(), verdict }
	}

	pub(crate) fn is_fresh(&self, window: Duration) -> bool {
		let window = std::time::Duration::try_from(window).unwrap_or_default();

		self.completed_at.elapsed() < window
	}

	/// Whether a caller that started waiting on the slot at `arrived` may take this verdict.
	///
	/// Failures only reach callers that queued up behind the attempt that produced them; a
	/// caller arriving afterwards makes its own attempt.
	pub(crate) fn is_reusable_by(&self, arrived: Instant, window: Duration) -> bool {
		match self.verdict {
			SharedVerdict::Failed { .. } => self.completed_at >= arrived,
			_ => self.is_fresh(window),
		}
	}
}

/// Shareable part of a refresh result.
#[derive(Clone, Debug)]
pub(crate) enum SharedVerdict {
	/// The refresh succeeded and produced this session.
	Rotated(Box<Session>),
	/// The IdP rejected the refresh token.
	Unauthorized,
	/// The refresh failed without a verdict on the token itself.
	Failed {
		/// Display form of the leader's error.
		message: String,
		/// HTTP status, when the IdP answered.
		status: Option<u16>,
		/// Upstream `Retry-After` hint.
		retry_after: Option<Duration>,
		/// Whether the leader's failure was an availability problem.
		transient: bool,
	},
}
impl SharedVerdict {
	pub(crate) fn failed(err: &Error) -> Self {
		Self::Failed {
			message: err.to_string(),
			status: err.http_status(),
			retry_after: err.retry_after(),
			transient: err.is_transient(),
		}
	}

	/// Rebuilds the error a follower reports for this verdict.
	pub(crate) fn to_result(&self) -> Result<Session> {
		match self {
			Self::Rotated(session) => Ok(session.as_ref().clone()),
			Self::Unauthorized => Err(Error::RefreshUnauthorized),
			Self::Failed { message, status, retry_after, transient: true } =>
				Err(TransientError::Endpoint {
					endpoint: IdpEndpoint::Refresh,
					message: message.clone(),
					status: *status,
					retry_after: *retry_after,
				}
				.into()),
			Self::Failed { message, status, .. } => Err(Error::Rejected {
				endpoint: IdpEndpoint::Refresh,
				status: *status,
				message: message.clone(),
			}),
		}
	}
}

/// Per-refresh-token single-flight coordinator.
///
/// Slots are keyed by the refresh token fingerprint so raw tokens never become map keys.
/// Concurrent refreshes for one token serialize on the slot's async mutex; the first caller
/// performs the IdP exchange and records a [`SharedRefresh`] that followers reuse while it is
/// younger than the descriptor's single-flight window.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
	slots: Mutex<HashMap<String, RefreshSlot>>,
}
impl RefreshCoordinator {
	/// Number of refresh tokens currently tracked.
	pub fn tracked(&self) -> usize {
		self.slots.lock().len()
	}

	/// Returns (and creates on demand) the slot for a fingerprint, pruning idle slots whose
	/// shared result has aged out.
	pub(crate) fn slot(&self, fingerprint: &str, window: Duration) -> RefreshSlot {
		let mut slots = self.slots.lock();

		slots.retain(|key, slot| key == fingerprint || !is_idle(slot, window));
		slots.entry(fingerprint.to_owned()).or_insert_with(Default::default).clone()
	}

	/// Returns `true` while a refresh for the fingerprint holds its slot.
	pub(crate) fn in_flight(&self, fingerprint: &str) -> bool {
		self.slots.lock().get(fingerprint).is_some_and(|slot| slot.try_lock().is_none())
	}

	/// Drops the slot for a fingerprint so no later caller reuses its result.
	pub(crate) fn forget(&self, fingerprint: &str) -> bool {
		self.slots.lock().remove(fingerprint).is_some()
	}
}

fn is_idle(slot: &RefreshSlot, window: Duration) -> bool {
	if Arc::strong_count(slot) > 1 {
		return false;
	}

	match slot.try_lock() {
		Some(shared) =>
			!shared.as_ref().is_some_and(|shared| shared.is_reusable_by(Instant::now(), window)),
		None => false,
	}
}

impl<C, M> SessionBroker<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Ends a session locally.
	///
	/// Any shared refresh result for the session's refresh token is discarded so a later
	/// caller presenting the same token goes back to the IdP. Returns `true` if a slot was
	/// dropped.
	pub fn end_session(&self, session: &Session) -> bool {
		let dropped = session
			.tokens
			.refresh_token()
			.map(TokenSecret::fingerprint)
			.is_some_and(|fingerprint| self.coordinator.forget(&fingerprint));

		#[cfg(feature = "tracing")]
		tracing::debug!(user = session.identity.username.as_str(), dropped, "Session ended.");

		dropped
	}

	/// Single-flight coordinator shared by every clone of this broker.
	pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
		&self.coordinator
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const WINDOW: Duration = Duration::seconds(30);

	#[test]
	fn slots_are_shared_per_fingerprint() {
		let coordinator = RefreshCoordinator::default();
		let first = coordinator.slot("a", WINDOW);
		let second = coordinator.slot("a", WINDOW);

		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(coordinator.tracked(), 1);
	}

	#[test]
	fn idle_slots_are_pruned() {
		let coordinator = RefreshCoordinator::default();

		drop(coordinator.slot("stale", WINDOW));

		let _held = coordinator.slot("b", WINDOW);

		assert_eq!(coordinator.tracked(), 1);
		assert!(coordinator.forget("b"));
		assert!(!coordinator.forget("stale"));
	}

	#[test]
	fn fresh_results_survive_pruning() {
		let coordinator = RefreshCoordinator::default();
		let slot = coordinator.slot("shared", WINDOW);

		*slot.try_lock().expect("Slot should be free.") =
			Some(SharedRefresh::new(SharedVerdict::Unauthorized));
		drop(slot);
		drop(coordinator.slot("other", WINDOW));

		assert_eq!(coordinator.tracked(), 2);
	}

	#[tokio::test]
	async fn locked_slots_report_in_flight() {
		let coordinator = RefreshCoordinator::default();
		let slot = coordinator.slot("busy", WINDOW);
		let guard = slot.lock().await;

		assert!(coordinator.in_flight("busy"));
		assert!(!coordinator.in_flight("idle"));

		drop(guard);

		assert!(!coordinator.in_flight("busy"));
	}

	#[test]
	fn failures_only_reach_callers_queued_before_completion() {
		let queued = Instant::now();
		let shared = SharedRefresh::new(SharedVerdict::failed(&Error::from(
			TransientError::Endpoint {
				endpoint: IdpEndpoint::Refresh,
				message: "HTTP 503".into(),
				status: Some(503),
				retry_after: Some(Duration::seconds(1)),
			},
		)));
		let late = Instant::now();

		assert!(shared.is_reusable_by(queued, WINDOW));
		assert!(!shared.is_reusable_by(late + std::time::Duration::from_millis(1), WINDOW));

		let err = shared.verdict.to_result().expect_err("Failed verdict must stay an error.");

		assert!(err.is_transient());
		assert_eq!(err.http_status(), Some(503));
		assert_eq!(err.retry_after(), Some(Duration::seconds(1)));
	}

	#[test]
	fn rejections_stay_non_transient_for_followers() {
		let verdict = SharedVerdict::failed(&Error::Rejected {
			endpoint: IdpEndpoint::Refresh,
			status: Some(403),
			message: "forbidden".into(),
		});
		let err = verdict.to_result().expect_err("Failed verdict must stay an error.");

		assert!(matches!(err, Error::Rejected { status: Some(403), .. }));
	}
}
