//! Walks a broker through the component token chain against a mock platform:
//! verify ticket, master token, tenant token, and a JS-SDK signature.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use component_broker::{
	api::ReqwestTransportErrorMapper,
	auth::{AppId, TenantCredential, TenantId},
	cache::CredentialCache,
	config::ComponentConfig,
	flows::Broker,
	http::ReqwestHttpClient,
	platform::PlatformDescriptor,
	store::{MemoryStore, MemoryTenantDirectory},
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt().with_env_filter("component_broker=info").init();

	let server = MockServer::start_async().await;
	let master_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/cgi-bin/component/api_component_token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"component_access_token\":\"demo-master\",\"expires_in\":7200}");
		})
		.await;
	let tenant_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/cgi-bin/component/api_authorizer_token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"authorizer_access_token\":\"demo-tenant\",\"expires_in\":7200}");
		})
		.await;
	let ticket_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/cgi-bin/ticket/getticket").query_param("type", "jsapi");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"errcode\":0,\"errmsg\":\"ok\",\"ticket\":\"demo-ticket\",\"expires_in\":7200}");
		})
		.await;
	let component = ComponentConfig {
		app_id: AppId::new("wxcomponent0001")?,
		app_secret: "component-secret".into(),
		msg_token: "msg-token".into(),
		msg_key: "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG".into(),
	};
	let tenant = TenantId::new("wxtenant0001")?;
	let tenants = Arc::new(MemoryTenantDirectory::default());

	tenants.insert(TenantCredential::new(tenant.clone(), "refreshtoken@@@demo"));

	let cache = Arc::new(CredentialCache::new(Arc::new(MemoryStore::default())).with_single_flight(true));
	let descriptor = PlatformDescriptor::builder().single_base(Url::parse(&server.base_url())?).build()?;
	let broker = <Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>>::with_http_client(
		component,
		cache,
		tenants,
		descriptor,
		ReqwestHttpClient::default(),
		Arc::new(ReqwestTransportErrorMapper),
	)?;

	// Normally delivered by an encrypted component push.
	broker.set_verify_ticket("ticket@@@demo").await?;

	let tenant_token = broker.get_tenant_token(&tenant).await?;
	let signature = broker.js_sdk_signature(&tenant, "https://shop.example.com/item?id=7").await?;

	println!("Tenant token: {}.", tenant_token.expose());
	println!("wx.config: {}.", serde_json::to_string(&signature)?);
	println!("Cache hits so far: {}.", broker.cache.metrics().hits());

	master_mock.assert_async().await;
	tenant_mock.assert_async().await;
	ticket_mock.assert_async().await;

	Ok(())
}
