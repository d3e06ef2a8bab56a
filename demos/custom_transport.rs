//! Demonstrates plugging a custom transport into the broker and walking one session through
//! login, reuse, a degraded refresh during an outage, and a rotation once the IdP is back.
//!
//! 1. Implement [`IdpHttpClient`] for the transport (here a scripted in-memory IdP).
//! 2. Provide a [`TransportErrorMapper`] that turns the transport's errors into crate errors.
//! 3. Pass both to [`SessionBroker::with_http_client`].

// std
use std::{
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicU32, Ordering},
	},
};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use color_eyre::Result;
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use idp_session::{
	auth::Credentials,
	error::{Error, TransientError},
	flows::SessionBroker,
	http::{HttpFuture, IdpHttpClient, IdpRequest, IdpResponse},
	idp::TransportErrorMapper,
	provider::{IdpDescriptor, IdpEndpoint, RetryPolicy},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let descriptor = IdpDescriptor::builder(Url::parse("https://idp.example.com/api/")?)
		.retry(RetryPolicy::none())
		.build()?;
	let idp = Arc::new(ScriptedIdp::default());
	let broker: SessionBroker<ScriptedIdp, ScriptedMapper> =
		SessionBroker::with_http_client(descriptor, Arc::clone(&idp), Arc::new(ScriptedMapper));
	let session = broker.authenticate(&Credentials::new("front-desk", "correct horse")).await?;
	let now = OffsetDateTime::now_utc();

	println!("Logged in as {}.", session.identity.display_name);

	let evaluation = broker.evaluate(session, now, None).await;

	println!("Right after login: {:?} -> {}.", evaluation.action, evaluation.state);

	idp.offline.store(true, Ordering::SeqCst);

	let later = now + Duration::minutes(57);
	let evaluation = broker.evaluate(evaluation.session, later, None).await;

	println!(
		"Near expiry during an outage: {:?} -> {} (absorbed: {}).",
		evaluation.action,
		evaluation.state,
		evaluation.failure.map(|err| err.to_string()).unwrap_or_default()
	);

	idp.offline.store(false, Ordering::SeqCst);

	let evaluation = broker.evaluate(evaluation.session, later, None).await;

	println!("Once the IdP is back: {:?} -> {}.", evaluation.action, evaluation.state);
	println!("Envelope: {}.", serde_json::to_string(&evaluation.session.envelope())?);
	println!("Refresh metrics: {:?}.", broker.refresh_metrics);

	Ok(())
}

#[derive(Debug)]
enum ScriptedTransportError {
	Offline,
}
impl Display for ScriptedTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Offline => f.write_str("identity provider is unreachable"),
		}
	}
}
impl StdError for ScriptedTransportError {}

#[derive(Default)]
struct ScriptedIdp {
	offline: AtomicBool,
	rotations: AtomicU32,
}
impl ScriptedIdp {
	fn answer(&self, request: &IdpRequest) -> IdpResponse {
		let now = OffsetDateTime::now_utc();
		let (lifetime, refresh_token) = if request.url.path().ends_with("/login") {
			(Duration::hours(1), "refresh-0".to_owned())
		} else {
			let rotation = self.rotations.fetch_add(1, Ordering::SeqCst) + 1;

			(Duration::hours(2), format!("refresh-{rotation}"))
		};
		let payload = URL_SAFE_NO_PAD.encode(format!("{{\"exp\":{}}}", (now + lifetime).unix_timestamp()));
		let body = format!(
			r#"{{"status":true,"message":"ok","data":{{"token":"e30.{payload}.sig","user":{{"id":7,"username":"front-desk","role":"admin","name":"Front Desk","permissions":["booking:read"]}}}}}}"#
		);

		IdpResponse {
			status: 200,
			headers: vec![
				("content-type".into(), "application/json".into()),
				("set-cookie".into(), format!("refresh_token={refresh_token}; Path=/; HttpOnly")),
			],
			body: body.into_bytes(),
		}
	}
}
impl IdpHttpClient for ScriptedIdp {
	type TransportError = ScriptedTransportError;

	fn execute(&self, request: IdpRequest) -> HttpFuture<'_, Self::TransportError> {
		Box::pin(async move {
			if self.offline.load(Ordering::SeqCst) {
				return Err(ScriptedTransportError::Offline);
			}

			Ok(self.answer(&request))
		})
	}
}

struct ScriptedMapper;
impl TransportErrorMapper<ScriptedTransportError> for ScriptedMapper {
	fn map_transport_error(&self, endpoint: IdpEndpoint, error: ScriptedTransportError) -> Error {
		TransientError::Endpoint { endpoint, message: error.to_string(), status: None, retry_after: None }
			.into()
	}
}
