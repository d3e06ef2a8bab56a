// self
use crate::{
	_prelude::*,
	provider::{IdpDescriptor, IdpEndpoint, IdpEndpoints, RetryPolicy},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum DescriptorError {
	/// Base URL cannot carry relative paths (e.g., `mailto:`).
	#[error("The base URL cannot be used as a base: {url}.")]
	CannotBeABase {
		/// Offending base URL.
		url: String,
	},
	/// An endpoint path could not be joined onto the base URL.
	#[error("The {endpoint} path `{path}` is invalid.")]
	InvalidPath {
		/// Which endpoint failed.
		endpoint: IdpEndpoint,
		/// Path that failed to join.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must use HTTPS unless insecure HTTP was explicitly allowed.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: IdpEndpoint,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Refresh cookie names must be valid cookie tokens.
	#[error("Refresh cookie name `{name}` is not a valid cookie name.")]
	InvalidCookieName {
		/// Rejected cookie name.
		name: String,
	},
	/// Durations must be strictly positive (the threshold may be zero).
	#[error("The {field} duration must be positive.")]
	NonPositiveDuration {
		/// Field that failed validation.
		field: &'static str,
	},
	/// Retry policy must allow at least one attempt.
	#[error("Retry policy must allow at least one attempt.")]
	NoAttempts,
}

/// Builder for [`IdpDescriptor`] values.
#[derive(Debug)]
pub struct IdpDescriptorBuilder {
	/// Base URL every endpoint is resolved against.
	pub base_url: Url,
	/// Relative path of the login endpoint.
	pub login_path: String,
	/// Relative path of the refresh endpoint.
	pub refresh_path: String,
	/// Name of the cookie carrying the refresh token.
	pub refresh_cookie: String,
	/// Lead time before expiry at which sessions are refreshed.
	pub refresh_threshold: Duration,
	/// Upper bound applied to every IdP request.
	pub request_timeout: Duration,
	/// Sharing window for completed refreshes.
	pub singleflight_window: Duration,
	/// Retry policy for refresh calls.
	pub retry: RetryPolicy,
	/// Permits `http://` endpoints (local development and tests).
	pub allow_insecure_http: bool,
}
impl IdpDescriptorBuilder {
	/// Creates a new builder seeded with the provided base URL and defaults.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			login_path: "login".into(),
			refresh_path: "refresh-token".into(),
			refresh_cookie: IdpDescriptor::DEFAULT_REFRESH_COOKIE.into(),
			refresh_threshold: IdpDescriptor::DEFAULT_REFRESH_THRESHOLD,
			request_timeout: IdpDescriptor::DEFAULT_REQUEST_TIMEOUT,
			singleflight_window: IdpDescriptor::DEFAULT_SINGLEFLIGHT_WINDOW,
			retry: RetryPolicy::default(),
			allow_insecure_http: false,
		}
	}

	/// Overrides the login endpoint path.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.login_path = path.into();

		self
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the refresh cookie name.
	pub fn refresh_cookie(mut self, name: impl Into<String>) -> Self {
		self.refresh_cookie = name.into();

		self
	}

	/// Overrides the proactive refresh threshold (defaults to 5 minutes).
	pub fn refresh_threshold(mut self, threshold: Duration) -> Self {
		self.refresh_threshold = threshold;

		self
	}

	/// Overrides the per-request timeout (defaults to 10 seconds).
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Overrides the single-flight sharing window (defaults to 30 seconds).
	pub fn singleflight_window(mut self, window: Duration) -> Self {
		self.singleflight_window = window;

		self
	}

	/// Overrides the retry policy.
	pub fn retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Permits plain HTTP endpoints.
	pub fn allow_insecure_http(mut self, allow: bool) -> Self {
		self.allow_insecure_http = allow;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<IdpDescriptor, DescriptorError> {
		let base_url = directory_base(self.base_url)?;
		let endpoints = IdpEndpoints {
			login: join(&base_url, IdpEndpoint::Login, &self.login_path)?,
			refresh: join(&base_url, IdpEndpoint::Refresh, &self.refresh_path)?,
		};
		let descriptor = IdpDescriptor {
			base_url,
			endpoints,
			refresh_cookie: self.refresh_cookie,
			refresh_threshold: self.refresh_threshold,
			request_timeout: self.request_timeout,
			singleflight_window: self.singleflight_window,
			retry: self.retry,
		};

		descriptor.validate(self.allow_insecure_http)?;

		Ok(descriptor)
	}
}

impl IdpDescriptor {
	fn validate(&self, allow_insecure_http: bool) -> Result<(), DescriptorError> {
		if !allow_insecure_http {
			validate_endpoint(IdpEndpoint::Login, &self.endpoints.login)?;
			validate_endpoint(IdpEndpoint::Refresh, &self.endpoints.refresh)?;
		}

		validate_cookie_name(&self.refresh_cookie)?;

		if self.refresh_threshold.is_negative() {
			return Err(DescriptorError::NonPositiveDuration { field: "refresh_threshold" });
		}
		if !self.request_timeout.is_positive() {
			return Err(DescriptorError::NonPositiveDuration { field: "request_timeout" });
		}
		if self.singleflight_window.is_negative() {
			return Err(DescriptorError::NonPositiveDuration { field: "singleflight_window" });
		}

		self.retry.validate()
	}
}

// `Url::join` replaces the last path segment unless the base ends with a slash.
fn directory_base(mut url: Url) -> Result<Url, DescriptorError> {
	if url.cannot_be_a_base() {
		return Err(DescriptorError::CannotBeABase { url: url.to_string() });
	}
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	Ok(url)
}

fn join(base: &Url, endpoint: IdpEndpoint, path: &str) -> Result<Url, DescriptorError> {
	base.join(path.trim_start_matches('/')).map_err(|source| DescriptorError::InvalidPath {
		endpoint,
		path: path.to_owned(),
		source,
	})
}

fn validate_endpoint(endpoint: IdpEndpoint, url: &Url) -> Result<(), DescriptorError> {
	if url.scheme() != "https" {
		Err(DescriptorError::InsecureEndpoint { endpoint, url: url.to_string() })
	} else {
		Ok(())
	}
}

fn validate_cookie_name(name: &str) -> Result<(), DescriptorError> {
	let invalid = name.is_empty()
		|| name.chars().any(|ch| {
			ch.is_control() || ch.is_whitespace() || "()<>@,;:\\\"/[]?={}".contains(ch)
		});

	if invalid {
		Err(DescriptorError::InvalidCookieName { name: name.to_owned() })
	} else {
		Ok(())
	}
}
