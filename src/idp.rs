//! Identity-provider facade: request construction, status handling, and error mapping.

mod schema;

// self
use crate::{
	_prelude::*,
	auth::{Credentials, Identity, TokenSecret},
	cookie::{self, RefreshCookie},
	error::{ConfigError, TransientError, TransportError},
	http::{HttpMethod, IdpHttpClient, IdpRequest, IdpResponse},
	idp::schema::IdpEnvelope,
	provider::{IdpDescriptor, IdpEndpoint, ProviderErrorContext, ProviderErrorKind, ProviderStrategy},
};

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an error emitted by the transport into a crate error.
	fn map_transport_error(&self, endpoint: IdpEndpoint, error: E) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(&self, endpoint: IdpEndpoint, err: ReqwestError) -> Error {
		if err.is_builder() {
			return ConfigError::from(err).into();
		}
		if err.is_timeout() {
			return TransientError::Endpoint {
				endpoint,
				message: "request timed out".into(),
				status: err.status().map(|code| code.as_u16()),
				retry_after: None,
			}
			.into();
		}

		TransportError::from(err).into()
	}
}

/// Successful exchange with the IdP.
#[derive(Debug)]
pub(crate) struct IdpExchange {
	pub(crate) access_token: String,
	pub(crate) identity: Identity,
	pub(crate) refresh_cookie: Option<RefreshCookie>,
}

#[derive(Serialize)]
struct LoginBody<'a> {
	username: &'a str,
	password: &'a str,
}

/// Borrowed view over the broker's transport, mapper, strategy, and descriptor.
pub(crate) struct IdpFacade<'a, C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) descriptor: &'a IdpDescriptor,
	pub(crate) http_client: &'a C,
	pub(crate) mapper: &'a M,
	pub(crate) strategy: &'a dyn ProviderStrategy,
}
impl<C, M> IdpFacade<'_, C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// `POST /login`. Every non-success answer, including a 2xx body that does not parse, is
	/// reported as invalid credentials so the caller cannot tell a bad username from a bad
	/// password.
	pub(crate) async fn login(&self, credentials: &Credentials) -> Result<IdpExchange> {
		const ENDPOINT: IdpEndpoint = IdpEndpoint::Login;

		let body = serde_json::to_vec(&LoginBody {
			username: credentials.username.trim(),
			password: credentials.expose_password(),
		})
		.map_err(ConfigError::RequestEncode)?;
		let request = IdpRequest::new(
			HttpMethod::Post,
			self.descriptor.endpoint(ENDPOINT).clone(),
			self.descriptor.request_timeout,
		)
		.with_header("accept", "application/json")
		.with_json_body(body);
		let response = self.send(ENDPOINT, request).await?;

		if !response.is_success() {
			return Err(Error::invalid_credentials(format!(
				"login was rejected with HTTP {}",
				response.status
			)));
		}

		let envelope = parse_envelope(ENDPOINT, &response).map_err(|err| {
			#[cfg(feature = "tracing")]
			if let Error::Transient(TransientError::ResponseParse { source, .. }) = &err {
				tracing::debug!(
					path = %source.path(),
					error = %source.inner(),
					"Login response did not match the expected schema."
				);
			}
			#[cfg(not(feature = "tracing"))]
			let _ = err;

			Error::invalid_credentials("login response did not report success")
		})?;
		let payload = envelope
			.into_success()
			.map_err(|_| Error::invalid_credentials("login response did not report success"))?;

		Ok(self.exchange(payload, &response))
	}

	/// `GET /refresh-token` with the refresh token attached as a cookie.
	pub(crate) async fn refresh(&self, refresh_token: &TokenSecret) -> Result<IdpExchange> {
		const ENDPOINT: IdpEndpoint = IdpEndpoint::Refresh;

		let request = IdpRequest::new(
			HttpMethod::Get,
			self.descriptor.endpoint(ENDPOINT).clone(),
			self.descriptor.request_timeout,
		)
		.with_header("accept", "application/json")
		.with_header("cookie", cookie::cookie_header(&self.descriptor.refresh_cookie, refresh_token));
		let response = self.send(ENDPOINT, request).await?;

		if !response.is_success() {
			return Err(self.map_status_error(ENDPOINT, &response));
		}

		let payload = parse_envelope(ENDPOINT, &response)?.into_success().map_err(|message| {
			Error::Rejected {
				endpoint: ENDPOINT,
				status: Some(response.status),
				message: message.unwrap_or_else(|| "response did not report success".into()),
			}
		})?;

		Ok(self.exchange(payload, &response))
	}

	async fn send(&self, endpoint: IdpEndpoint, request: IdpRequest) -> Result<IdpResponse> {
		let response = self
			.http_client
			.execute(request)
			.await
			.map_err(|err| self.mapper.map_transport_error(endpoint, err))?;

		#[cfg(feature = "tracing")]
		tracing::debug!(endpoint = endpoint.as_str(), status = response.status, "Identity provider responded.");

		Ok(response)
	}

	fn exchange(&self, payload: schema::IdpPayload, response: &IdpResponse) -> IdpExchange {
		IdpExchange {
			access_token: payload.token,
			identity: payload.user.into(),
			refresh_cookie: RefreshCookie::from_set_cookie(
				&self.descriptor.refresh_cookie,
				response.set_cookies(),
			),
		}
	}

	fn map_status_error(&self, endpoint: IdpEndpoint, response: &IdpResponse) -> Error {
		let mut ctx = ProviderErrorContext::new(endpoint).with_http_status(response.status);

		match parse_envelope(endpoint, response).ok().and_then(|envelope| envelope.message) {
			Some(message) => ctx = ctx.with_message(message),
			None if !response.body.is_empty() => ctx = ctx.with_body_preview(response.body_text()),
			None => {},
		}

		match self.strategy.classify_error(&ctx) {
			ProviderErrorKind::Unauthorized => Error::RefreshUnauthorized,
			ProviderErrorKind::Transient => TransientError::Endpoint {
				endpoint,
				message: ctx.summary(),
				status: Some(response.status),
				retry_after: response.retry_after(),
			}
			.into(),
			ProviderErrorKind::Rejected =>
				Error::Rejected { endpoint, status: Some(response.status), message: ctx.summary() },
		}
	}
}

fn parse_envelope(endpoint: IdpEndpoint, response: &IdpResponse) -> Result<IdpEnvelope> {
	let mut de = serde_json::Deserializer::from_slice(&response.body);

	serde_path_to_error::deserialize(&mut de).map_err(|source| {
		TransientError::ResponseParse { endpoint, source, status: Some(response.status) }.into()
	})
}
