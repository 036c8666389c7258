//! JS-SDK and card tickets.

// self
use crate::{
	_prelude::*,
	api::{ApiCall, TransportErrorMapper},
	auth::{CacheKey, FetchedCredential, TenantId, TicketKind, TokenSecret},
	crypto::{self, signature},
	flows::Broker,
	http::PlatformHttpClient,
	obs::{self, FlowKind, FlowSpan},
	platform::Endpoint,
};

const JS_SDK_NONCE_LEN: usize = 16;

/// Page configuration for `wx.config`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsSdkSignature {
	/// Tenant app id.
	pub app_id: String,
	/// Random string used in the signature.
	pub nonce_str: String,
	/// Unix seconds used in the signature.
	pub timestamp: i64,
	/// Page URL without its fragment.
	pub url: String,
	/// Lowercase hex SHA-1 digest.
	pub signature: String,
}
impl JsSdkSignature {
	/// Computes the JS-SDK signature; any `#fragment` in `url` is ignored.
	pub fn sign(ticket: &str, nonce_str: &str, timestamp: i64, url: &str) -> String {
		let url = url.split_once('#').map_or(url, |(page, _)| page);
		let plain = format!("jsapi_ticket={ticket}&noncestr={nonce_str}&timestamp={timestamp}&url={url}");

		signature::sha1_hex(plain.as_bytes())
	}
}

#[derive(Deserialize)]
struct TicketBody {
	#[serde(deserialize_with = "crate::api::non_empty")]
	ticket: String,
	#[serde(deserialize_with = "crate::api::positive_seconds")]
	expires_in: i64,
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + PlatformHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns a tenant ticket, minting one from the tenant token when the cache is cold.
	pub async fn get_ticket(&self, tenant: &TenantId, kind: TicketKind) -> Result<TokenSecret> {
		const KIND: FlowKind = FlowKind::Ticket;

		let span = FlowSpan::new(KIND, "get_ticket");
		let key = CacheKey::ticket(tenant, kind);

		span.instrument(obs::observe_async(
			KIND,
			self.cache.get_or_fetch(&key, || async move {
				let token = self.get_tenant_token(tenant).await?;
				let body: TicketBody = self
					.call(
						ApiCall::new(Endpoint::Ticket)
							.query("access_token", token.expose())
							.query("type", kind.as_str()),
					)
					.await?;

				tracing::info!(%tenant, %kind, expires_in = body.expires_in, "Minted ticket.");

				Ok(FetchedCredential::new(body.ticket, body.expires_in))
			}),
		))
		.await
	}

	/// Signs `url` for the tenant's JS-SDK with a fresh nonce and the current time.
	pub async fn js_sdk_signature(&self, tenant: &TenantId, url: &str) -> Result<JsSdkSignature> {
		let ticket = self.get_ticket(tenant, TicketKind::JsApi).await?;
		let nonce_str = crypto::random_string(JS_SDK_NONCE_LEN);
		let timestamp = OffsetDateTime::now_utc().unix_timestamp();
		let url = url.split_once('#').map_or(url, |(page, _)| page).to_owned();
		let signature = JsSdkSignature::sign(ticket.expose(), &nonce_str, timestamp, &url);

		Ok(JsSdkSignature { app_id: tenant.to_string(), nonce_str, timestamp, url, signature })
	}
}
