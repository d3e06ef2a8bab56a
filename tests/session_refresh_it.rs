#![cfg(feature = "reqwest")]

mod common;

// std
use std::time::Duration as StdDuration;
// crates.io
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use common::*;
use idp_session::{
	auth::{TokenPair, TokenSecret},
	error::{Error, TransientError},
	flows::RefreshOutcome,
	provider::RetryPolicy,
	session::{EvaluationAction, Session, SessionErrorKind, SessionState, SessionUpdate},
};

const REFRESH_PATH: &str = "/refresh-token";

fn refresh_token(session: &Session) -> Option<&str> {
	session.tokens.refresh_token().map(TokenSecret::expose)
}

#[tokio::test]
async fn valid_sessions_are_reused_without_network_calls() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(REFRESH_PATH);
			then.status(500);
		})
		.await;
	let broker = broker(&server);
	let session = session_expiring_in(Duration::minutes(30));
	let now = OffsetDateTime::now_utc();

	for _ in 0..3 {
		let evaluation = broker.evaluate(session.clone(), now, None).await;

		assert_eq!(evaluation.action, EvaluationAction::Reuse);
		assert_eq!(evaluation.state, SessionState::Fresh);
		assert_eq!(evaluation.session, session);
		assert!(evaluation.failure.is_none());
	}

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn unauthorized_refresh_marks_the_session() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(REFRESH_PATH).header("cookie", "refresh_token=refresh-1");
			then.status(401).body(r#"{"status":false,"message":"Refresh token expired"}"#);
		})
		.await;
	let broker = broker_with(descriptor(&server).retry(RetryPolicy {
		max_attempts: 3,
		initial_backoff: Duration::milliseconds(10),
		max_backoff: Duration::milliseconds(20),
		jitter: false,
	}));
	let session = session_expiring_in(Duration::minutes(2));
	let evaluation = broker.evaluate(session.clone(), OffsetDateTime::now_utc(), None).await;

	assert_eq!(evaluation.action, EvaluationAction::Refresh);
	assert_eq!(evaluation.state, SessionState::Error);
	assert_eq!(evaluation.session.error, Some(SessionErrorKind::RefreshUnauthorized));
	assert_eq!(evaluation.session.tokens, session.tokens);
	assert!(evaluation.session.envelope().requires_reauthentication());
	assert!(matches!(evaluation.failure, Some(Error::RefreshUnauthorized)));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn timeout_with_a_valid_token_keeps_the_session() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path(REFRESH_PATH);
			then.status(200).delay(StdDuration::from_secs(2)).body("{}");
		})
		.await;

	let broker = broker(&server);
	let now = OffsetDateTime::now_utc();
	let session = session_expiring_in(Duration::minutes(10));
	let outcome = broker.refresh(&session, now).await.expect("Timeout must be absorbed.");

	assert!(!outcome.is_rotated());
	assert_eq!(outcome.session(), &session);

	let session = session_expiring_in(Duration::minutes(3));
	let evaluation = broker.evaluate(session.clone(), now, None).await;

	assert_eq!(evaluation.action, EvaluationAction::Refresh);
	assert_eq!(evaluation.session.error, None);
	assert_eq!(evaluation.session.tokens.access_token(), session.tokens.access_token());
	assert_eq!(refresh_token(&evaluation.session), Some(REFRESH_TOKEN));
	assert!(evaluation.failure.as_ref().is_some_and(Error::is_transient));
	assert_eq!(broker.refresh_metrics.degraded(), 2);
}

#[tokio::test]
async fn timeout_with_an_expired_token_fails_the_session() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path(REFRESH_PATH);
			then.status(200).delay(StdDuration::from_secs(2)).body("{}");
		})
		.await;

	let broker = broker(&server);
	let session = session_expiring_in(Duration::minutes(-1));
	let evaluation = broker.evaluate(session, OffsetDateTime::now_utc(), None).await;

	assert_eq!(evaluation.session.error, Some(SessionErrorKind::RefreshFailed));
	assert_eq!(evaluation.state, SessionState::Error);
	assert_eq!(broker.refresh_metrics.failures(), 1);
}

#[tokio::test]
async fn refused_connection_is_absorbed_until_expiry() {
	let broker = broker_with(descriptor_at(&closed_port_url()));
	let now = OffsetDateTime::now_utc();
	let session = session_expiring_in(Duration::minutes(2));
	let evaluation = broker.evaluate(session.clone(), now, None).await;

	assert_eq!(evaluation.action, EvaluationAction::Refresh);
	assert_eq!(evaluation.session, session);
	assert!(matches!(evaluation.failure, Some(Error::Transport(_))), "{:?}", evaluation.failure);

	let evaluation =
		broker.evaluate(session_expiring_in(Duration::minutes(-1)), now, None).await;

	assert_eq!(evaluation.session.error, Some(SessionErrorKind::RefreshFailed));
	assert!(matches!(evaluation.failure, Some(Error::Transport(_))));
	assert_eq!(broker.refresh_metrics.degraded(), 1);
	assert_eq!(broker.refresh_metrics.failures(), 1);
}

#[tokio::test]
async fn rotated_cookie_replaces_the_refresh_token() {
	let server = MockServer::start_async().await;
	let token = jwt_in(Duration::hours(1));
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(REFRESH_PATH).header("cookie", "refresh_token=refresh-1");
			then.status(200)
				.header("set-cookie", "refresh_token=refresh-2; Path=/; HttpOnly; Secure")
				.body(idp_body(&token, "admin"));
		})
		.await;
	let broker = broker(&server);
	let now = OffsetDateTime::now_utc();
	let evaluation = broker.evaluate(session_expiring_in(Duration::minutes(2)), now, None).await;

	mock.assert_async().await;

	assert_eq!(evaluation.action, EvaluationAction::Refresh);
	assert_eq!(evaluation.state, SessionState::Valid);
	assert_eq!(evaluation.session.tokens.access_token().expose(), token);
	assert_eq!(refresh_token(&evaluation.session), Some("refresh-2"));
	assert_eq!(evaluation.session.refreshed_at, Some(now));
	assert!(evaluation.session.identity.permissions.contains("booking:write"));
}

#[tokio::test]
async fn refresh_without_cookie_keeps_the_refresh_token() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path(REFRESH_PATH);
			then.status(200).body(idp_body(&jwt_in(Duration::hours(1)), "admin"));
		})
		.await;

	let outcome = broker(&server)
		.refresh(&session_expiring_in(Duration::minutes(1)), OffsetDateTime::now_utc())
		.await
		.expect("Refresh should succeed.");

	assert!(outcome.is_rotated());
	assert_eq!(refresh_token(&outcome.into_session()), Some(REFRESH_TOKEN));
}

#[tokio::test]
async fn concurrent_refreshes_hit_the_idp_once() {
	let server = MockServer::start_async().await;
	let token = jwt_in(Duration::hours(1));
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(REFRESH_PATH);
			then.status(200)
				.delay(StdDuration::from_millis(100))
				.header("set-cookie", "refresh_token=refresh-2; Path=/")
				.body(idp_body(&token, "admin"));
		})
		.await;
	let broker = broker(&server);
	let session = session_expiring_in(Duration::minutes(2));
	let now = OffsetDateTime::now_utc();
	let (first, second) = tokio::join!(
		broker.evaluate(session.clone(), now, None),
		broker.evaluate(session.clone(), now, None),
	);

	mock.assert_calls_async(1).await;

	for evaluation in [&first, &second] {
		assert_eq!(evaluation.session.tokens.access_token().expose(), token);
		assert_eq!(refresh_token(&evaluation.session), Some("refresh-2"));
	}

	assert_eq!(broker.refresh_metrics.shared(), 1);
	assert_eq!(broker.refresh_metrics.successes(), 2);
}

#[tokio::test]
async fn concurrent_refreshes_share_an_outage() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(REFRESH_PATH);
			then.status(503).delay(StdDuration::from_millis(100)).body("maintenance");
		})
		.await;
	let broker = broker(&server);
	let session = session_expiring_in(Duration::minutes(2));
	let now = OffsetDateTime::now_utc();
	let (first, second, third) = tokio::join!(
		broker.evaluate(session.clone(), now, None),
		broker.evaluate(session.clone(), now, None),
		broker.evaluate(session.clone(), now, None),
	);

	mock.assert_calls_async(1).await;

	for evaluation in [&first, &second, &third] {
		assert_eq!(evaluation.session, session);
		assert!(evaluation.failure.as_ref().is_some_and(Error::is_transient));
	}

	assert_eq!(broker.refresh_metrics.shared(), 2);
	assert_eq!(broker.refresh_metrics.degraded(), 3);

	broker.evaluate(session, now, None).await;

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn ended_sessions_do_not_share_results() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(REFRESH_PATH);
			then.status(200).body(idp_body(&jwt_in(Duration::hours(1)), "admin"));
		})
		.await;
	let broker = broker(&server);
	let session = session_expiring_in(Duration::minutes(2));
	let now = OffsetDateTime::now_utc();

	broker.refresh(&session, now).await.expect("First refresh should succeed.");

	assert!(broker.end_session(&session));

	broker.refresh(&session, now).await.expect("Second refresh should succeed.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn retryable_failures_stop_at_the_bound() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(REFRESH_PATH);
			then.status(503).body("maintenance");
		})
		.await;
	let broker = broker_with(descriptor(&server).retry(RetryPolicy {
		max_attempts: 3,
		initial_backoff: Duration::milliseconds(10),
		max_backoff: Duration::milliseconds(20),
		jitter: false,
	}));
	let err = broker
		.refresh(&session_expiring_in(Duration::minutes(-5)), OffsetDateTime::now_utc())
		.await
		.expect_err("Expired token with an unavailable IdP must fail.");

	mock.assert_calls_async(3).await;

	assert!(matches!(err, Error::Transient(TransientError::Endpoint { status: Some(503), .. })));
}

#[tokio::test]
async fn rejected_token_verdict_is_shared() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(REFRESH_PATH);
			then.status(401);
		})
		.await;
	let broker = broker(&server);
	let session = session_expiring_in(Duration::minutes(2));
	let now = OffsetDateTime::now_utc();

	for _ in 0..2 {
		let err = broker.refresh(&session, now).await.expect_err("Rejected token must fail.");

		assert!(matches!(err, Error::RefreshUnauthorized));
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn demoted_identity_loses_the_session() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(REFRESH_PATH);
			then.status(200).body(idp_body(&jwt_in(Duration::hours(1)), "agent"));
		})
		.await;
	let broker = broker(&server);
	let session = session_expiring_in(Duration::minutes(2));
	let evaluation = broker.evaluate(session.clone(), OffsetDateTime::now_utc(), None).await;

	assert_eq!(evaluation.session.error, Some(SessionErrorKind::RefreshUnauthorized));
	assert_eq!(evaluation.session.identity, session.identity);
	assert_eq!(evaluation.session.tokens, session.tokens);
	assert!(matches!(evaluation.failure, Some(Error::RefreshUnauthorized)));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn malformed_success_body_is_a_decode_error() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path(REFRESH_PATH);
			then.status(200).body(r#"{"status":true,"data":{"token":"t"}}"#);
		})
		.await;

	let evaluation = broker(&server)
		.evaluate(session_expiring_in(Duration::minutes(-1)), OffsetDateTime::now_utc(), None)
		.await;

	assert_eq!(evaluation.session.error, Some(SessionErrorKind::RefreshFailed));
	assert!(matches!(
		evaluation.failure,
		Some(Error::Transient(TransientError::ResponseParse { .. }))
	));
}

#[tokio::test]
async fn missing_refresh_token_is_terminal_without_network_calls() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(REFRESH_PATH);
			then.status(200);
		})
		.await;
	let session = Session::new(identity(), TokenPair::new(jwt_in(Duration::minutes(2)), None));
	let evaluation = broker(&server).evaluate(session, OffsetDateTime::now_utc(), None).await;

	assert_eq!(evaluation.session.error, Some(SessionErrorKind::MissingRefreshToken));
	assert!(matches!(evaluation.failure, Some(Error::MissingRefreshToken)));

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn terminal_sessions_halt_and_updates_bypass_expiry() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(REFRESH_PATH);
			then.status(200);
		})
		.await;
	let broker = broker(&server);
	let now = OffsetDateTime::now_utc();
	let mut halted = session_expiring_in(Duration::minutes(-1));

	halted.error = Some(SessionErrorKind::RefreshUnauthorized);

	let evaluation = broker.evaluate(halted.clone(), now, None).await;

	assert_eq!(evaluation.action, EvaluationAction::Halt);
	assert_eq!(evaluation.session, halted);
	assert!(matches!(
		evaluation.failure,
		Some(Error::SessionTerminated(SessionErrorKind::RefreshUnauthorized))
	));

	let expired = session_expiring_in(Duration::minutes(-1));
	let update = SessionUpdate::default().with_refresh_token("refresh-external");
	let evaluation = broker.evaluate(expired.clone(), now, Some(update)).await;

	assert_eq!(evaluation.action, EvaluationAction::Update);
	assert_eq!(evaluation.session.tokens.access_token(), expired.tokens.access_token());
	assert_eq!(
		evaluation.session.tokens.access_token_expires_at_ms(),
		expired.tokens.access_token_expires_at_ms()
	);
	assert_eq!(refresh_token(&evaluation.session), Some("refresh-external"));

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn failed_sessions_recover_on_the_next_evaluation() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path(REFRESH_PATH);
			then.status(200)
				.header("set-cookie", "refresh_token=refresh-2")
				.body(idp_body(&jwt_in(Duration::hours(1)), "admin"));
		})
		.await;

	let mut failed = session_expiring_in(Duration::minutes(-10));

	failed.error = Some(SessionErrorKind::RefreshFailed);

	let evaluation = broker(&server).evaluate(failed, OffsetDateTime::now_utc(), None).await;

	assert_eq!(evaluation.action, EvaluationAction::Refresh);
	assert_eq!(evaluation.session.error, None);
	assert_eq!(refresh_token(&evaluation.session), Some("refresh-2"));
	assert!(matches!(evaluation.session.envelope().error, None));
	assert!(matches!(
		broker_with(descriptor(&server)).refresh(&evaluation.session, OffsetDateTime::now_utc()).await,
		Ok(RefreshOutcome::Rotated(_))
	));
}
