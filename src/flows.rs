//! Broker flows against the platform.
//!
//! - `component`: verify ticket, master token, pre-authorization code, inbound pushes.
//! - `authorizer`: tenant tokens, authorization code exchange, tenant info.
//! - `ticket`: JS-SDK and card tickets.
//! - `web_auth`: end-user authorization redirect and callback.

pub mod authorizer;
pub mod component;
pub mod ticket;
pub mod web_auth;

pub use authorizer::*;
pub use component::*;
pub use ticket::*;
pub use web_auth::*;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	api::{ApiCall, TransportErrorMapper},
	auth::AppId,
	cache::CredentialCache,
	config::ComponentConfig,
	crypto::EnvelopeCodec,
	error::ConfigError,
	http::PlatformHttpClient,
	platform::PlatformDescriptor,
	store::TenantDirectory,
};
#[cfg(feature = "reqwest")]
use crate::{api::ReqwestTransportErrorMapper, http::ReqwestHttpClient};

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport stack.
pub type ReqwestBroker = Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Coordinates every upstream interaction of one third-party component.
///
/// The broker owns the transport, the credential cache, the tenant directory,
/// and the component identity; flows only describe which endpoint to call and
/// which cache key guards the result. Several brokers may share one cache.
#[derive(Clone)]
pub struct Broker<C, M>
where
	C: ?Sized + PlatformHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound platform request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Cache for tokens and tickets.
	pub cache: Arc<CredentialCache>,
	/// Lookup of tenant refresh credentials.
	pub tenants: Arc<dyn TenantDirectory>,
	/// Upstream base URLs.
	pub descriptor: PlatformDescriptor,
	/// Component identity and secrets.
	pub component: ComponentConfig,
	codec: EnvelopeCodec,
}
impl<C, M> Broker<C, M>
where
	C: ?Sized + PlatformHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a broker that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		component: ComponentConfig,
		cache: Arc<CredentialCache>,
		tenants: Arc<dyn TenantDirectory>,
		descriptor: PlatformDescriptor,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self, ConfigError> {
		let codec = component.envelope_codec()?;

		Ok(Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			cache,
			tenants,
			descriptor,
			component,
			codec,
		})
	}

	/// Component app id.
	pub fn app_id(&self) -> &AppId {
		&self.component.app_id
	}

	/// Envelope codec bound to the component identity.
	pub fn codec(&self) -> &EnvelopeCodec {
		&self.codec
	}

	pub(crate) async fn call<T>(&self, call: ApiCall<'_>) -> Result<T>
	where
		T: DeserializeOwned,
	{
		call.send(self.http_client.as_ref(), self.transport_mapper.as_ref(), &self.descriptor).await
	}
}
#[cfg(feature = "reqwest")]
impl Broker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a broker with its own reqwest transport.
	pub fn new(
		component: ComponentConfig,
		cache: Arc<CredentialCache>,
		tenants: Arc<dyn TenantDirectory>,
		descriptor: PlatformDescriptor,
	) -> Result<Self, ConfigError> {
		Self::with_http_client(
			component,
			cache,
			tenants,
			descriptor,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Debug for Broker<C, M>
where
	C: ?Sized + PlatformHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("app_id", &self.component.app_id)
			.field("descriptor", &self.descriptor)
			.field("cache", &self.cache)
			.finish_non_exhaustive()
	}
}
