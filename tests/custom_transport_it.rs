//! Brokers over a hand-written transport: no HTTP server, no reqwest.

// std
use std::{
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use idp_session::{
	auth::{Credentials, Identity},
	error::{Error, TransportError},
	flows::SessionBroker,
	http::{HttpFuture, HttpMethod, IdpHttpClient, IdpRequest, IdpResponse},
	idp::TransportErrorMapper,
	provider::{AdmissionDecision, IdpDescriptor, IdpEndpoint, ProviderStrategy, RetryPolicy},
	session::{EvaluationAction, SessionErrorKind},
};

#[derive(Debug)]
struct Unreachable;
impl Display for Unreachable {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("connection refused")
	}
}
impl StdError for Unreachable {}

#[derive(Default)]
struct CannedIdp {
	refresh_down: bool,
	calls: AtomicUsize,
}
impl IdpHttpClient for CannedIdp {
	type TransportError = Unreachable;

	fn execute(&self, request: IdpRequest) -> HttpFuture<'_, Self::TransportError> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if request.method == HttpMethod::Get && self.refresh_down {
				return Err(Unreachable);
			}

			let exp = (OffsetDateTime::now_utc() + Duration::hours(1)).unix_timestamp();
			let token = format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(format!("{{\"exp\":{exp}}}")));
			let body = format!(
				r#"{{"status":200,"data":{{"token":"{token}","user":{{"id":"u-1","username":"desk","role":"Agent","displayName":"Desk"}}}}}}"#
			);

			Ok(IdpResponse {
				status: 200,
				headers: vec![("set-cookie".into(), "refresh_token=canned; HttpOnly".into())],
				body: body.into_bytes(),
			})
		})
	}
}

struct Mapper;
impl TransportErrorMapper<Unreachable> for Mapper {
	fn map_transport_error(&self, _endpoint: IdpEndpoint, error: Unreachable) -> Error {
		TransportError::Network { source: Box::new(error) }.into()
	}
}

struct AdmitEveryone;
impl ProviderStrategy for AdmitEveryone {
	fn admit(&self, _identity: &Identity) -> AdmissionDecision {
		AdmissionDecision::Admit
	}
}

fn broker(idp: CannedIdp) -> SessionBroker<CannedIdp, Mapper> {
	let descriptor = IdpDescriptor::builder(
		Url::parse("https://idp.example.com/auth").expect("Fixture URL should parse."),
	)
	.retry(RetryPolicy::none())
	.build()
	.expect("Descriptor should build.");

	SessionBroker::with_http_client(descriptor, idp, Mapper)
}

#[tokio::test]
async fn default_strategy_refuses_agents_case_insensitively() {
	let err = broker(CannedIdp::default())
		.authenticate(&Credentials::new("desk", "pw"))
		.await
		.expect_err("Agent role must be refused.");

	assert!(matches!(err, Error::InvalidCredentials { .. }));
}

#[tokio::test]
async fn custom_strategy_and_transport_errors_flow_through() {
	let broker = broker(CannedIdp { refresh_down: true, ..Default::default() })
		.with_strategy(Arc::new(AdmitEveryone));
	let session = broker
		.authenticate(&Credentials::new("desk", "pw"))
		.await
		.expect("Custom strategy should admit the identity.");

	assert_eq!(session.identity.id.as_ref(), "u-1");
	assert_eq!(session.identity.display_name, "Desk");

	let now = OffsetDateTime::now_utc() + Duration::minutes(58);
	let evaluation = broker.evaluate(session.clone(), now, None).await;

	assert_eq!(evaluation.action, EvaluationAction::Refresh);
	assert_eq!(evaluation.session, session);
	assert!(matches!(evaluation.failure, Some(Error::Transport(TransportError::Network { .. }))));

	let evaluation = broker.evaluate(session, now + Duration::minutes(5), None).await;

	assert_eq!(evaluation.session.error, Some(SessionErrorKind::RefreshFailed));
	assert_eq!(broker.http_client.calls.load(Ordering::SeqCst), 3);
	assert_eq!(broker.refresh_metrics.degraded(), 1);
}
