//! Tenant (authorizer) credentials.
//!
//! Tenant tokens are refreshed from the refresh credential held by the
//! [`TenantDirectory`](crate::store::TenantDirectory). The broker never writes that
//! credential back: a rotated refresh token only reaches the host application
//! through [`Broker::query_authorization`].

// self
use crate::{
	_prelude::*,
	api::{ApiCall, TransportErrorMapper},
	auth::{CacheKey, FetchedCredential, TenantCredential, TenantId, TokenSecret},
	error::FormatError,
	flows::Broker,
	http::PlatformHttpClient,
	obs::{self, FlowKind, FlowSpan},
	platform::Endpoint,
};

/// JSON object returned by the platform, kept verbatim.
pub type RawObject = serde_json::Map<String, serde_json::Value>;

/// Result of exchanging an authorization code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationGrant {
	/// Credential the host application should persist for the tenant.
	pub credential: TenantCredential,
	/// Tenant access token, already written to the cache.
	pub access_token: TokenSecret,
	/// Declared lifetime of `access_token`, in seconds.
	pub expires_in: i64,
}

/// Tenant account and authorization details.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AuthorizerInfo {
	/// Account profile (nickname, avatar, service type, ...).
	pub authorizer_info: RawObject,
	/// Granted scopes and app id.
	pub authorization_info: RawObject,
}

#[derive(Deserialize)]
struct QueryAuthBody {
	authorization_info: AuthorizationInfoBody,
}

#[derive(Deserialize)]
struct AuthorizationInfoBody {
	authorizer_appid: String,
	#[serde(deserialize_with = "crate::api::non_empty")]
	authorizer_access_token: String,
	#[serde(deserialize_with = "crate::api::positive_seconds")]
	expires_in: i64,
	#[serde(deserialize_with = "crate::api::non_empty")]
	authorizer_refresh_token: String,
	#[serde(default)]
	func_info: Vec<FuncInfo>,
}

#[derive(Deserialize)]
struct FuncInfo {
	funcscope_category: FuncScope,
}

#[derive(Deserialize)]
struct FuncScope {
	id: i64,
}

#[derive(Deserialize)]
struct AuthorizerTokenBody {
	#[serde(deserialize_with = "crate::api::non_empty")]
	authorizer_access_token: String,
	#[serde(deserialize_with = "crate::api::positive_seconds")]
	expires_in: i64,
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + PlatformHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns the tenant access token, refreshing it when the cache is cold.
	///
	/// Fails with [`Error::UnknownTenant`] when the directory has no credential.
	pub async fn get_tenant_token(&self, tenant: &TenantId) -> Result<TokenSecret> {
		const KIND: FlowKind = FlowKind::TenantToken;

		let span = FlowSpan::new(KIND, "get_tenant_token");
		let key = CacheKey::tenant_token(tenant);

		span.instrument(obs::observe_async(
			KIND,
			self.cache.get_or_fetch(&key, || self.refresh_tenant_token(tenant)),
		))
		.await
	}

	async fn refresh_tenant_token(&self, tenant: &TenantId) -> Result<FetchedCredential> {
		let credential = self
			.tenants
			.credential(tenant)
			.await?
			.ok_or_else(|| Error::UnknownTenant { tenant: tenant.to_string() })?;
		let master = self.get_master_token().await?;
		let body: AuthorizerTokenBody = self
			.call(
				ApiCall::new(Endpoint::AuthorizerToken)
					.query("component_access_token", master.expose())
					.json(serde_json::json!({
						"component_appid": self.app_id(),
						"authorizer_appid": tenant,
						"authorizer_refresh_token": credential.refresh_token.expose(),
					})),
			)
			.await?;

		tracing::info!(%tenant, expires_in = body.expires_in, "Refreshed tenant access token.");

		Ok(FetchedCredential::new(body.authorizer_access_token, body.expires_in))
	}

	/// Exchanges an authorization code and warms the tenant token cache.
	pub async fn query_authorization(&self, auth_code: &str) -> Result<AuthorizationGrant> {
		const KIND: FlowKind = FlowKind::Authorization;

		let span = FlowSpan::new(KIND, "query_authorization");

		span.instrument(obs::observe_async(KIND, async {
			let master = self.get_master_token().await?;
			let body: QueryAuthBody = self
				.call(
					ApiCall::new(Endpoint::QueryAuth)
						.query("component_access_token", master.expose())
						.json(serde_json::json!({
							"component_appid": self.app_id(),
							"authorization_code": auth_code,
						})),
				)
				.await?;
			let info = body.authorization_info;
			let tenant = TenantId::new(&info.authorizer_appid)
				.map_err(|_| FormatError::MissingElement { element: "authorizer_appid" })?;
			let credential = TenantCredential::new(tenant.clone(), info.authorizer_refresh_token)
				.with_scopes(info.func_info.iter().map(|f| f.funcscope_category.id.to_string()));
			let fetched = FetchedCredential::new(info.authorizer_access_token, info.expires_in);

			self.cache.put(&CacheKey::tenant_token(&tenant), &fetched).await?;

			tracing::info!(%tenant, scopes = credential.granted_scopes.len(), "Tenant authorized.");

			Ok(AuthorizationGrant {
				credential,
				access_token: fetched.value,
				expires_in: fetched.expires_in,
			})
		}))
		.await
	}

	/// Fetches a tenant's account and authorization info.
	pub async fn authorizer_info(&self, tenant: &TenantId) -> Result<AuthorizerInfo> {
		const KIND: FlowKind = FlowKind::Authorization;

		let span = FlowSpan::new(KIND, "authorizer_info");

		span.instrument(obs::observe_async(KIND, async {
			let master = self.get_master_token().await?;

			self.call(
				ApiCall::new(Endpoint::AuthorizerInfo)
					.query("component_access_token", master.expose())
					.json(serde_json::json!({
						"component_appid": self.app_id(),
						"authorizer_appid": tenant,
					})),
			)
			.await
		}))
		.await
	}
}
