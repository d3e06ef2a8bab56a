//! Request signing contracts that attach session credentials to arbitrary HTTP clients.

// self
#[cfg(feature = "reqwest")] use crate::provider::IdpDescriptor;
use crate::{_prelude::*, session::SessionEnvelope};

/// Describes how to attach a [`SessionEnvelope`] to an outbound request without
/// constraining the HTTP client type.
///
/// Implementations add `Authorization: Bearer <accessToken>` and the refresh-token cookie,
/// and must refuse to sign when the envelope carries an error.
pub trait RequestSignerExt<Request, Error>
where
	Self: Send + Sync,
{
	/// Consumes the provided request and injects the session's credentials.
	fn attach_session(&self, request: Request, envelope: &SessionEnvelope) -> Result<Request, Error>;
}

/// Signer for [`reqwest::RequestBuilder`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestRequestSigner {
	cookie_name: String,
}
#[cfg(feature = "reqwest")]
impl ReqwestRequestSigner {
	/// Creates a signer that names the refresh cookie after `cookie_name`.
	pub fn new(cookie_name: impl Into<String>) -> Self {
		Self { cookie_name: cookie_name.into() }
	}

	/// Creates a signer using the descriptor's refresh cookie name.
	pub fn from_descriptor(descriptor: &IdpDescriptor) -> Self {
		Self::new(descriptor.refresh_cookie.clone())
	}
}
#[cfg(feature = "reqwest")]
impl Default for ReqwestRequestSigner {
	fn default() -> Self {
		Self::new(IdpDescriptor::DEFAULT_REFRESH_COOKIE)
	}
}
#[cfg(feature = "reqwest")]
impl RequestSignerExt<reqwest::RequestBuilder, Error> for ReqwestRequestSigner {
	fn attach_session(
		&self,
		request: reqwest::RequestBuilder,
		envelope: &SessionEnvelope,
	) -> Result<reqwest::RequestBuilder> {
		if let Some(kind) = envelope.error {
			return Err(Error::SessionTerminated(kind));
		}

		let request = request.header(reqwest::header::AUTHORIZATION, envelope.bearer());

		Ok(match envelope.refresh_cookie(&self.cookie_name) {
			Some(cookie) => request.header(reqwest::header::COOKIE, cookie),
			None => request,
		})
	}
}
