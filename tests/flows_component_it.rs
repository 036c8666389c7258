// crates.io
use httpmock::prelude::*;
// self
use component_broker::{
	_preludet::*,
	auth::CacheKey,
	crypto::PlatformMessage,
	error::ConfigError,
	flows::{ComponentEvent, LoginAuthType},
	store::Clock,
};

const TOKEN_PATH: &str = "/cgi-bin/component/api_component_token";
const PRE_AUTH_PATH: &str = "/cgi-bin/component/api_create_preauthcode";

fn push(harness: &TestHarness, message: &PlatformMessage) -> (String, String, String, String) {
	let envelope = harness
		.broker
		.codec()
		.seal_with(message, "1700000000", "push-nonce")
		.expect("Push should seal.");
	let xml = envelope.to_xml().expect("Push should serialize.");

	(xml, envelope.timestamp, envelope.nonce, envelope.signature)
}

fn verify_ticket_push(ticket: &str) -> PlatformMessage {
	PlatformMessage::new()
		.with_text("AppId", TEST_COMPONENT_APP_ID)
		.with_text("CreateTime", "1700000000")
		.with_text("InfoType", "component_verify_ticket")
		.with_text("ComponentVerifyTicket", ticket)
}

#[tokio::test]
async fn verify_ticket_push_is_stored_without_expiry() {
	let server = MockServer::start_async().await;
	let harness = build_reqwest_test_broker(&server.base_url());
	let (xml, timestamp, nonce, signature) = push(&harness, &verify_ticket_push("ticket@@@1"));
	let event = harness
		.broker
		.ingest_component_push(&xml, &timestamp, &nonce, &signature)
		.await
		.expect("Verify ticket push should be accepted.");

	assert_eq!(event, ComponentEvent::VerifyTicket);

	let entry = harness
		.store
		.entry(&CacheKey::verify_ticket(harness.broker.app_id()))
		.expect("Verify ticket should be stored.");

	assert_eq!(entry.value.expose(), "ticket@@@1");
	assert_eq!(entry.expires_at, None);

	harness.clock.advance(Duration::days(30));

	let ticket = harness
		.broker
		.verify_ticket()
		.await
		.expect("Ticket lookup should succeed.")
		.expect("Ticket should survive any amount of time.");

	assert_eq!(ticket.expose(), "ticket@@@1");
}

#[tokio::test]
async fn forged_push_leaves_the_ticket_untouched() {
	let server = MockServer::start_async().await;
	let harness = build_reqwest_test_broker(&server.base_url());

	harness.broker.set_verify_ticket("ticket@@@old").await.expect("Seeding should succeed.");

	let (xml, timestamp, nonce, _) = push(&harness, &verify_ticket_push("ticket@@@new"));
	let err = harness
		.broker
		.ingest_component_push(&xml, &timestamp, &nonce, "0000")
		.await
		.expect_err("Forged push must be rejected.");

	assert!(err.is_untrusted());

	let ticket = harness
		.broker
		.verify_ticket()
		.await
		.expect("Ticket lookup should succeed.")
		.expect("Seeded ticket should remain.");

	assert_eq!(ticket.expose(), "ticket@@@old");
}

#[tokio::test]
async fn authorization_pushes_surface_their_codes() {
	let server = MockServer::start_async().await;
	let harness = build_reqwest_test_broker(&server.base_url());
	let message = PlatformMessage::new()
		.with_text("AppId", TEST_COMPONENT_APP_ID)
		.with_text("InfoType", "authorized")
		.with_text("AuthorizerAppid", "wxnewtenant")
		.with_text("AuthorizationCode", "queryauthcode@@@abc")
		.with_text("AuthorizationCodeExpiredTime", "1700003600");
	let (xml, timestamp, nonce, signature) = push(&harness, &message);
	let event = harness
		.broker
		.ingest_component_push(&xml, &timestamp, &nonce, &signature)
		.await
		.expect("Authorization push should be accepted.");
	let notice = match event {
		ComponentEvent::Authorized(notice) => notice,
		other => panic!("Expected an authorization notice, got {other:?}."),
	};

	assert_eq!(notice.tenant.as_ref(), "wxnewtenant");
	assert_eq!(notice.authorization_code, "queryauthcode@@@abc");
	assert_eq!(notice.code_expires_at, Some(1_700_003_600));

	let message = PlatformMessage::new()
		.with_text("InfoType", "notify_third_fasteregister")
		.with_text("Status", "0");
	let (xml, timestamp, nonce, signature) = push(&harness, &message);
	let event = harness
		.broker
		.ingest_component_push(&xml, &timestamp, &nonce, &signature)
		.await
		.expect("Unknown push kinds should pass through.");

	assert!(matches!(event, ComponentEvent::Other { ref info_type, .. } if info_type == "notify_third_fasteregister"));
}

#[tokio::test]
async fn master_token_requires_a_verify_ticket() {
	let server = MockServer::start_async().await;
	let harness = build_reqwest_test_broker(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"component_access_token\":\"master-1\",\"expires_in\":7200}");
		})
		.await;
	let err = harness
		.broker
		.get_master_token()
		.await
		.expect_err("Master token must not be minted without a ticket.");

	assert!(matches!(err, Error::Config(ConfigError::MissingVerifyTicket)));

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn master_token_is_cached_with_safety_margin() {
	let server = MockServer::start_async().await;
	let harness = build_reqwest_test_broker(&server.base_url());
	let start = harness.clock.now();
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH).header("content-type", "application/json");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"component_access_token\":\"master-1\",\"expires_in\":7200}");
		})
		.await;

	harness.broker.set_verify_ticket("ticket@@@1").await.expect("Seeding should succeed.");

	let first = harness.broker.get_master_token().await.expect("First call should mint.");
	let second = harness.broker.get_master_token().await.expect("Second call should hit the cache.");

	assert_eq!(first.expose(), "master-1");
	assert_eq!(second.expose(), "master-1");

	mock.assert_calls_async(1).await;

	let entry = harness
		.store
		.entry(&CacheKey::master_token(harness.broker.app_id()))
		.expect("Master token should be cached.");

	assert_eq!(entry.expires_at, Some(start + Duration::seconds(6900)));

	harness.clock.advance(Duration::seconds(6900));
	harness.broker.get_master_token().await.expect("Expired entry should be re-minted.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn errcode_bodies_become_upstream_errors() {
	let server = MockServer::start_async().await;
	let harness = build_reqwest_test_broker(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"errcode\":61004,\"errmsg\":\"access clientip is not registered\"}");
		})
		.await;

	harness.broker.set_verify_ticket("ticket@@@1").await.expect("Seeding should succeed.");

	for _ in 0..2 {
		let err = harness.broker.get_master_token().await.expect_err("Errcode must fail the call.");
		let upstream = match err {
			Error::Upstream(upstream) => upstream,
			other => panic!("Expected an upstream error, got {other:?}."),
		};

		assert_eq!(upstream.endpoint, "component_token");
		assert_eq!(upstream.errcode, Some(61004));
		assert!(upstream.raw.contains("clientip"));
	}

	// Failures are never cached.
	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn malformed_success_bodies_report_the_missing_field() {
	let server = MockServer::start_async().await;
	let harness = build_reqwest_test_broker(&server.base_url());

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body("{\"expires_in\":7200}");
		})
		.await;
	harness.broker.set_verify_ticket("ticket@@@1").await.expect("Seeding should succeed.");

	let err = harness.broker.get_master_token().await.expect_err("Missing token must fail.");
	let upstream = match err {
		Error::Upstream(upstream) => upstream,
		other => panic!("Expected an upstream error, got {other:?}."),
	};

	assert!(upstream.detail.is_some_and(|detail| detail.contains("component_access_token")));
}

#[tokio::test]
async fn empty_master_token_is_rejected_and_not_cached() {
	let server = MockServer::start_async().await;
	let harness = build_reqwest_test_broker(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"component_access_token\":\"\",\"expires_in\":7200}");
		})
		.await;

	harness.broker.set_verify_ticket("ticket@@@1").await.expect("Seeding should succeed.");

	for _ in 0..2 {
		let err = harness.broker.get_master_token().await.expect_err("Empty token must fail.");
		let upstream = match err {
			Error::Upstream(upstream) => upstream,
			other => panic!("Expected an upstream error, got {other:?}."),
		};

		assert_eq!(upstream.endpoint, "component_token");
		assert!(upstream.raw.contains("\"component_access_token\":\"\""));
		assert!(upstream.detail.is_some_and(|detail| detail.contains("component_access_token")));
	}

	mock.assert_calls_async(2).await;
	assert!(harness.store.entry(&CacheKey::master_token(harness.broker.app_id())).is_none());
}

#[tokio::test]
async fn non_positive_lifetime_is_rejected() {
	let server = MockServer::start_async().await;
	let harness = build_reqwest_test_broker(&server.base_url());

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"component_access_token\":\"T1\",\"expires_in\":0}");
		})
		.await;
	harness.broker.set_verify_ticket("ticket@@@1").await.expect("Seeding should succeed.");

	let err = harness.broker.get_master_token().await.expect_err("Zero lifetime must fail.");

	let upstream = match err {
		Error::Upstream(upstream) => upstream,
		other => panic!("Expected an upstream error, got {other:?}."),
	};

	assert!(upstream.detail.is_some_and(|detail| detail.contains("expires_in")));
}

#[tokio::test]
async fn login_url_carries_a_fresh_pre_auth_code() {
	let server = MockServer::start_async().await;
	let harness = build_reqwest_test_broker(&server.base_url());
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"component_access_token\":\"master-1\",\"expires_in\":7200}");
		})
		.await;
	let pre_auth_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(PRE_AUTH_PATH)
				.query_param("component_access_token", "master-1");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"pre_auth_code\":\"preauth@@@1\",\"expires_in\":600}");
		})
		.await;

	harness.broker.set_verify_ticket("ticket@@@1").await.expect("Seeding should succeed.");

	let redirect = Url::parse("https://tenant-admin.example.com/authorized").expect("URL should parse.");
	let url = harness
		.broker
		.component_login_url(&redirect, LoginAuthType::Both)
		.await
		.expect("Login URL should build.");
	let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();

	assert_eq!(url.path(), "/cgi-bin/componentloginpage");
	assert_eq!(pairs["component_appid"], TEST_COMPONENT_APP_ID);
	assert_eq!(pairs["pre_auth_code"], "preauth@@@1");
	assert_eq!(pairs["redirect_uri"], redirect.as_str());
	assert_eq!(pairs["auth_type"], "3");

	// Pre-authorization codes are single use and never cached.
	harness.broker.get_pre_auth_code().await.expect("Second code should be created.");

	token_mock.assert_calls_async(1).await;
	pre_auth_mock.assert_calls_async(2).await;
}
