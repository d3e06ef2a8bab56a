//! Transport primitives for identity-provider exchanges.
//!
//! The module exposes [`IdpHttpClient`] alongside the crate-owned [`IdpRequest`] and
//! [`IdpResponse`] so downstream crates can plug in a custom HTTP stack (or a fake one in
//! tests) without the broker depending on any particular client. Transport failures stay
//! typed as [`IdpHttpClient::TransportError`] until a
//! [`TransportErrorMapper`](crate::idp::TransportErrorMapper) classifies them.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

/// Boxed future returned by [`IdpHttpClient::execute`].
pub type HttpFuture<'a, E> = Pin<Box<dyn Future<Output = Result<IdpResponse, E>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing IdP requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// broker clone, and the returned futures must be `Send` so request handlers can hop
/// executors. Implementations must honor [`IdpRequest::timeout`]; the broker relies on it to
/// keep a hanging IdP from stalling a refresh.
pub trait IdpHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Sends the request and buffers the full response.
	fn execute(&self, request: IdpRequest) -> HttpFuture<'_, Self::TransportError>;
}

/// HTTP methods used against the IdP.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
	/// `GET`.
	Get,
	/// `POST`.
	Post,
}

/// Outbound request built by the broker.
#[derive(Clone)]
pub struct IdpRequest {
	/// Request method.
	pub method: HttpMethod,
	/// Absolute endpoint URL.
	pub url: Url,
	/// Header name/value pairs; names are lowercase.
	pub headers: Vec<(&'static str, String)>,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
	/// Upper bound for the whole exchange.
	pub timeout: Duration,
}
impl IdpRequest {
	/// Creates a request without headers or body.
	pub fn new(method: HttpMethod, url: Url, timeout: Duration) -> Self {
		Self { method, url, headers: Vec::new(), body: None, timeout }
	}

	/// Appends a header.
	pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
		self.headers.push((name, value.into()));

		self
	}

	/// Sets a JSON body and the matching content type.
	pub fn with_json_body(mut self, body: Vec<u8>) -> Self {
		self.body = Some(body);

		self.with_header("content-type", "application/json")
	}

	/// Returns the first value of a header, if present.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}
}
impl Debug for IdpRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let header_names = self.headers.iter().map(|(name, _)| *name).collect::<Vec<_>>();

		f.debug_struct("IdpRequest")
			.field("method", &self.method)
			.field("url", &self.url.as_str())
			.field("headers", &header_names)
			.field("body_len", &self.body.as_ref().map(Vec::len))
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Buffered IdP response.
#[derive(Clone, Debug, Default)]
pub struct IdpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Header name/value pairs; names are lowercase and may repeat.
	pub headers: Vec<(String, String)>,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl IdpResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Iterates over every value of a header.
	pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
		self.headers
			.iter()
			.filter(move |(candidate, _)| candidate.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	/// Iterates over raw `Set-Cookie` values.
	pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
		self.header_values("set-cookie")
	}

	/// Parses `Retry-After` (delta-seconds or HTTP date) into a relative duration.
	pub fn retry_after(&self) -> Option<Duration> {
		let raw = self.header_values("retry-after").next()?.trim();

		if let Ok(secs) = raw.parse::<u32>() {
			return Some(Duration::seconds(i64::from(secs)));
		}
		if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
			let delta = moment - OffsetDateTime::now_utc();

			if delta.is_positive() {
				return Some(delta);
			}
		}

		None
	}

	/// Lossy UTF-8 view of the body, used for error previews.
	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Per-request timeouts come from [`IdpRequest::timeout`], so the wrapped client does not
/// need its own.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl IdpHttpClient for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn execute(&self, request: IdpRequest) -> HttpFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let method = match request.method {
				HttpMethod::Get => reqwest::Method::GET,
				HttpMethod::Post => reqwest::Method::POST,
			};
			let timeout = std::time::Duration::try_from(request.timeout).unwrap_or_default();
			let mut builder = client.request(method, request.url).timeout(timeout);

			for (name, value) in request.headers {
				builder = builder.header(name, value);
			}
			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.filter_map(|(name, value)| {
					value.to_str().ok().map(|value| (name.as_str().to_owned(), value.to_owned()))
				})
				.collect();
			let body = response.bytes().await?.to_vec();

			Ok(IdpResponse { status, headers, body })
		})
	}
}
