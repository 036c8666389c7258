//! Third-party platform broker: multi-tenant credential caching, authorization
//! handshakes, and the AES-CBC callback envelope in one crate.
//!
//! - [`crypto`] seals and opens callback envelopes and end-user session tokens.
//! - [`cache`] turns upstream token endpoints into cheap repeated reads.
//! - [`flows`] hosts the [`Broker`](flows::Broker) and every upstream operation.
//! - [`store`] defines the key/value, tenant, and profile collaborators.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod error;
pub mod flows;
pub mod http;
pub mod obs;
pub mod platform;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		api::ReqwestTransportErrorMapper,
		auth::{AppId, TenantCredential, TenantId},
		cache::CredentialCache,
		config::ComponentConfig,
		flows::Broker,
		http::ReqwestHttpClient,
		platform::PlatformDescriptor,
		store::{ManualClock, MemoryStore, MemoryTenantDirectory},
	};

	/// Broker type alias used by reqwest-backed integration tests.
	pub type ReqwestTestBroker = Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Component app id used by test fixtures.
	pub const TEST_COMPONENT_APP_ID: &str = "wxcomponent0001";
	/// Component app secret used by test fixtures.
	pub const TEST_COMPONENT_SECRET: &str = "component-secret";
	/// Envelope signature token used by test fixtures.
	pub const TEST_MSG_TOKEN: &str = "msg-token";
	/// 43-character envelope key used by test fixtures.
	pub const TEST_MSG_KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";
	/// Tenant registered by [`build_reqwest_test_broker`].
	pub const TEST_TENANT: &str = "wxtenant0001";
	/// Refresh credential of [`TEST_TENANT`].
	pub const TEST_TENANT_REFRESH: &str = "refreshtoken@@@tenant";

	/// Broker plus the in-memory collaborators it was built with.
	#[derive(Debug)]
	pub struct TestHarness {
		/// Broker under test.
		pub broker: ReqwestTestBroker,
		/// Backing credential store.
		pub store: Arc<MemoryStore>,
		/// Tenant directory with [`TEST_TENANT`] registered.
		pub tenants: Arc<MemoryTenantDirectory>,
		/// Clock driving the store.
		pub clock: ManualClock,
	}
	impl TestHarness {
		/// The registered test tenant.
		pub fn tenant(&self) -> TenantId {
			TenantId::new(TEST_TENANT).expect("Tenant fixture should be valid.")
		}
	}

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Component configuration shared by test fixtures.
	pub fn test_component_config(app_id: &str) -> ComponentConfig {
		ComponentConfig {
			app_id: AppId::new(app_id).expect("App fixture should be valid."),
			app_secret: TEST_COMPONENT_SECRET.into(),
			msg_token: TEST_MSG_TOKEN.into(),
			msg_key: TEST_MSG_KEY.into(),
		}
	}

	/// Constructs a broker pointed at `base_url` for every host, backed by a manual-clock
	/// memory store and a directory holding [`TEST_TENANT`].
	pub fn build_reqwest_test_broker(base_url: &str) -> TestHarness {
		let clock = ManualClock::new(OffsetDateTime::now_utc());
		let store = Arc::new(MemoryStore::with_clock(Arc::new(clock.clone())));
		let tenants = Arc::new(MemoryTenantDirectory::default());
		let descriptor = PlatformDescriptor::builder()
			.single_base(Url::parse(base_url).expect("Mock base URL should parse."))
			.build()
			.expect("Mock descriptor should validate.");

		tenants.insert(TenantCredential::new(
			TenantId::new(TEST_TENANT).expect("Tenant fixture should be valid."),
			TEST_TENANT_REFRESH,
		));

		let broker = Broker::with_http_client(
			test_component_config(TEST_COMPONENT_APP_ID),
			Arc::new(CredentialCache::new(store.clone())),
			tenants.clone(),
			descriptor,
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.expect("Test broker should build.");

		TestHarness { broker, store, tenants, clock }
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tracing_subscriber as _};
