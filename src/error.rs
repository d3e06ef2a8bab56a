//! Crate-level error types shared across flows, transports, and the session state machine.

// self
use crate::{_prelude::*, provider::IdpEndpoint, session::SessionErrorKind};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Username/password were rejected, the role is not admitted, or the login response was
	/// unusable.
	#[error("Invalid credentials: {reason}.")]
	InvalidCredentials {
		/// Broker-supplied reason string; never echoes the submitted secret.
		reason: String,
	},
	/// Session carries no refresh token, so no refresh can be attempted.
	#[error("Session does not carry a refresh token.")]
	MissingRefreshToken,
	/// Identity provider rejected the refresh token with HTTP 401.
	#[error("Identity provider rejected the refresh token.")]
	RefreshUnauthorized,
	/// Identity provider answered with a non-success status or body.
	#[error("Identity provider rejected the {endpoint} request: {message}.")]
	Rejected {
		/// Endpoint that produced the response.
		endpoint: IdpEndpoint,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Provider- or broker-supplied message.
		message: String,
	},
	/// Session already ended in a terminal state and must be re-authenticated.
	#[error("Session requires re-authentication ({0}).")]
	SessionTerminated(SessionErrorKind),
}
impl Error {
	/// Projects the error onto the session error taxonomy.
	///
	/// Anything that is neither a credential problem nor an explicit refresh-token rejection
	/// collapses into [`SessionErrorKind::RefreshFailed`].
	pub fn session_error_kind(&self) -> SessionErrorKind {
		match self {
			Self::InvalidCredentials { .. } => SessionErrorKind::InvalidCredentials,
			Self::MissingRefreshToken => SessionErrorKind::MissingRefreshToken,
			Self::RefreshUnauthorized => SessionErrorKind::RefreshUnauthorized,
			Self::SessionTerminated(kind) => *kind,
			_ => SessionErrorKind::RefreshFailed,
		}
	}

	/// Returns `true` for availability failures (network, timeout, 408/429/5xx).
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Transport(_) | Self::Transient(TransientError::Endpoint { .. }))
	}

	/// Returns `true` when repeating the same request may succeed.
	pub fn is_retryable(&self) -> bool {
		self.is_transient()
	}

	/// Upstream `Retry-After` hint, if the failure carried one.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Transient(TransientError::Endpoint { retry_after, .. }) => *retry_after,
			_ => None,
		}
	}

	/// HTTP status the IdP answered with, when the failure came from a response.
	pub fn http_status(&self) -> Option<u16> {
		match self {
			Self::Transient(
				TransientError::Endpoint { status, .. } | TransientError::ResponseParse { status, .. },
			)
			| Self::Rejected { status, .. } => *status,
			_ => None,
		}
	}

	pub(crate) fn invalid_credentials(reason: impl Into<String>) -> Self {
		Self::InvalidCredentials { reason: reason.into() }
	}
}

/// Configuration and validation failures raised by the crate.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// IdP descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::provider::DescriptorError),
	/// Request body could not be encoded.
	#[error("Request body could not be encoded.")]
	RequestEncode(#[source] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// IdP returned a retryable status or the request timed out.
	#[error("The {endpoint} endpoint is unavailable: {message}.")]
	Endpoint {
		/// Endpoint that failed.
		endpoint: IdpEndpoint,
		/// Provider- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// IdP responded with JSON that does not match the expected schema.
	#[error("The {endpoint} endpoint returned malformed JSON.")]
	ResponseParse {
		/// Endpoint that produced the body.
		endpoint: IdpEndpoint,
		/// Structured parsing failure, including the failing field path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the identity provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the identity provider.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
