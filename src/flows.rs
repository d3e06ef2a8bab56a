//! High-level session flows powered by the broker facade.

pub mod common;
pub mod evaluate;
pub mod login;
pub mod refresh;

pub use common::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	http::IdpHttpClient,
	idp::{IdpFacade, TransportErrorMapper},
	provider::{DefaultProviderStrategy, IdpDescriptor, ProviderStrategy},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, idp::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport stack.
pub type ReqwestSessionBroker = SessionBroker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Coordinates login, refresh, and per-request evaluation against a single IdP.
///
/// The broker owns the HTTP client, descriptor, and strategy references so each flow only
/// deals with its own decision logic. Clones share the refresh coordinator and metrics, so a
/// single broker (or its clones) should serve every request handler of the process.
#[derive(Clone)]
pub struct SessionBroker<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound IdP request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// IdP descriptor that defines endpoints and tunables.
	pub descriptor: IdpDescriptor,
	/// Strategy responsible for role admission and failure classification.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// Shared metrics recorder for refresh flow outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	coordinator: Arc<RefreshCoordinator>,
}
impl<C, M> SessionBroker<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a broker that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		descriptor: IdpDescriptor,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			descriptor,
			strategy: Arc::new(DefaultProviderStrategy),
			refresh_metrics: Default::default(),
			coordinator: Default::default(),
		}
	}

	/// Replaces the provider strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	fn idp(&self) -> IdpFacade<'_, C, M> {
		IdpFacade {
			descriptor: &self.descriptor,
			http_client: self.http_client.as_ref(),
			mapper: self.transport_mapper.as_ref(),
			strategy: self.strategy.as_ref(),
		}
	}
}
#[cfg(feature = "reqwest")]
impl SessionBroker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a new broker for the provided descriptor.
	///
	/// The broker provisions its own reqwest-backed transport and the default provider
	/// strategy. Use [`SessionBroker::with_strategy`] to customize admission or failure
	/// classification.
	pub fn new(descriptor: IdpDescriptor) -> Self {
		Self::with_http_client(
			descriptor,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Debug for SessionBroker<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionBroker")
			.field("descriptor", &self.descriptor)
			.field("refresh_metrics", &self.refresh_metrics)
			.finish()
	}
}
