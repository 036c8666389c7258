//! Component-level credentials and inbound component pushes.
//!
//! The platform pushes a fresh verify ticket roughly every ten minutes. The ticket
//! is stored without TTL and is the only input besides the app secret needed to
//! mint the master token, which in turn guards every tenant-scoped call.

// self
use crate::{
	_prelude::*,
	api::{ApiCall, TransportErrorMapper},
	auth::{CacheKey, FetchedCredential, TenantId, TokenSecret},
	crypto::PlatformMessage,
	error::{ConfigError, FormatError},
	flows::Broker,
	http::PlatformHttpClient,
	obs::{self, FlowKind, FlowSpan},
	platform::Endpoint,
};

/// Account types offered on the component login page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginAuthType {
	/// Official accounts only.
	OfficialAccount,
	/// Mini programs only.
	MiniProgram,
	/// Both account kinds.
	#[default]
	Both,
}
impl LoginAuthType {
	/// Upstream `auth_type` value.
	pub const fn as_str(self) -> &'static str {
		match self {
			LoginAuthType::OfficialAccount => "1",
			LoginAuthType::MiniProgram => "2",
			LoginAuthType::Both => "3",
		}
	}
}

/// Authorization change reported by a component push.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationNotice {
	/// Tenant whose authorization changed.
	pub tenant: TenantId,
	/// Code to pass to [`Broker::query_authorization`].
	pub authorization_code: String,
	/// Unix seconds after which the code is no longer accepted.
	pub code_expires_at: Option<i64>,
}

/// Decoded component push.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComponentEvent {
	/// A verify ticket arrived and has been stored.
	VerifyTicket,
	/// A tenant authorized the component.
	Authorized(AuthorizationNotice),
	/// A tenant changed its granted scopes.
	UpdateAuthorized(AuthorizationNotice),
	/// A tenant revoked the component.
	Unauthorized {
		/// Tenant that revoked.
		tenant: TenantId,
	},
	/// Any other `InfoType`, returned untouched.
	Other {
		/// Upstream `InfoType`.
		info_type: String,
		/// Decrypted message.
		message: PlatformMessage,
	},
}

#[derive(Deserialize)]
struct ComponentTokenBody {
	#[serde(deserialize_with = "crate::api::non_empty")]
	component_access_token: String,
	#[serde(deserialize_with = "crate::api::positive_seconds")]
	expires_in: i64,
}

#[derive(Deserialize)]
struct PreAuthCodeBody {
	#[serde(deserialize_with = "crate::api::non_empty")]
	pre_auth_code: String,
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + PlatformHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Latest verify ticket pushed by the platform.
	pub async fn verify_ticket(&self) -> Result<Option<TokenSecret>> {
		self.cache.get(&CacheKey::verify_ticket(self.app_id())).await
	}

	/// Stores a verify ticket; it never expires and is replaced by the next push.
	pub async fn set_verify_ticket(&self, ticket: impl Into<TokenSecret>) -> Result<()> {
		self.cache.set_persistent(&CacheKey::verify_ticket(self.app_id()), ticket.into()).await
	}

	/// Returns the component access token, minting one when the cache is cold.
	pub async fn get_master_token(&self) -> Result<TokenSecret> {
		const KIND: FlowKind = FlowKind::MasterToken;

		let span = FlowSpan::new(KIND, "get_master_token");
		let key = CacheKey::master_token(self.app_id());

		span.instrument(obs::observe_async(
			KIND,
			self.cache.get_or_fetch(&key, || self.fetch_master_token()),
		))
		.await
	}

	async fn fetch_master_token(&self) -> Result<FetchedCredential> {
		let ticket = self.verify_ticket().await?.ok_or(ConfigError::MissingVerifyTicket)?;
		let body: ComponentTokenBody = self
			.call(ApiCall::new(Endpoint::ComponentToken).json(serde_json::json!({
				"component_appid": self.app_id(),
				"component_appsecret": self.component.app_secret.expose(),
				"component_verify_ticket": ticket.expose(),
			})))
			.await?;

		tracing::info!(expires_in = body.expires_in, "Minted component access token.");

		Ok(FetchedCredential::new(body.component_access_token, body.expires_in))
	}

	/// Creates a single-use pre-authorization code; never cached.
	pub async fn get_pre_auth_code(&self) -> Result<String> {
		const KIND: FlowKind = FlowKind::PreAuthCode;

		let span = FlowSpan::new(KIND, "get_pre_auth_code");

		span.instrument(obs::observe_async(KIND, async {
			let token = self.get_master_token().await?;
			let body: PreAuthCodeBody = self
				.call(
					ApiCall::new(Endpoint::PreAuthCode)
						.query("component_access_token", token.expose())
						.json(serde_json::json!({ "component_appid": self.app_id() })),
				)
				.await?;

			Ok(body.pre_auth_code)
		}))
		.await
	}

	/// Builds the component login page URL a tenant admin is sent to.
	pub async fn component_login_url(
		&self,
		redirect_uri: &Url,
		auth_type: LoginAuthType,
	) -> Result<Url> {
		let pre_auth_code = self.get_pre_auth_code().await?;
		let mut url = self.descriptor.url(Endpoint::ComponentLogin)?;

		url.query_pairs_mut()
			.append_pair("component_appid", self.app_id())
			.append_pair("pre_auth_code", &pre_auth_code)
			.append_pair("redirect_uri", redirect_uri.as_str())
			.append_pair("auth_type", auth_type.as_str());

		Ok(url)
	}

	/// Verifies and decrypts a component push, storing verify tickets as they arrive.
	pub async fn ingest_component_push(
		&self,
		xml: &str,
		timestamp: &str,
		nonce: &str,
		signature: &str,
	) -> Result<ComponentEvent> {
		const KIND: FlowKind = FlowKind::ComponentPush;

		let span = FlowSpan::new(KIND, "ingest_component_push");

		span.instrument(obs::observe_async(KIND, async {
			let message = self.codec().decrypt_envelope(xml, timestamp, nonce, signature)?;
			let info_type = message.require_text("InfoType")?.to_owned();

			tracing::debug!(info_type = %info_type, "Received component push.");

			match info_type.as_str() {
				"component_verify_ticket" => {
					let ticket = message.require_text("ComponentVerifyTicket")?;

					self.set_verify_ticket(ticket).await?;

					Ok(ComponentEvent::VerifyTicket)
				},
				"authorized" => Ok(ComponentEvent::Authorized(notice(&message)?)),
				"updateauthorized" => Ok(ComponentEvent::UpdateAuthorized(notice(&message)?)),
				"unauthorized" => Ok(ComponentEvent::Unauthorized { tenant: tenant_of(&message)? }),
				_ => Ok(ComponentEvent::Other { info_type, message }),
			}
		}))
		.await
	}
}

fn tenant_of(message: &PlatformMessage) -> Result<TenantId> {
	let raw = message.require_text("AuthorizerAppid")?;

	TenantId::new(raw).map_err(|_| FormatError::MissingElement { element: "AuthorizerAppid" }.into())
}

fn notice(message: &PlatformMessage) -> Result<AuthorizationNotice> {
	Ok(AuthorizationNotice {
		tenant: tenant_of(message)?,
		authorization_code: message.require_text("AuthorizationCode")?.to_owned(),
		code_expires_at: message
			.text("AuthorizationCodeExpiredTime")
			.and_then(|raw| raw.trim().parse().ok()),
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn login_auth_type_maps_to_upstream_codes() {
		assert_eq!(LoginAuthType::OfficialAccount.as_str(), "1");
		assert_eq!(LoginAuthType::default().as_str(), "3");
	}

	#[test]
	fn authorization_notices_parse() {
		let message = PlatformMessage::new()
			.with_text("AppId", "wxcomponent")
			.with_text("InfoType", "authorized")
			.with_text("AuthorizerAppid", "wxtenant")
			.with_text("AuthorizationCode", "queryauthcode@@@1")
			.with_text("AuthorizationCodeExpiredTime", "1700000000");
		let parsed = notice(&message).expect("Notice should parse.");

		assert_eq!(parsed.tenant.as_ref(), "wxtenant");
		assert_eq!(parsed.authorization_code, "queryauthcode@@@1");
		assert_eq!(parsed.code_expires_at, Some(1_700_000_000));
		assert!(notice(&PlatformMessage::new().with_text("AuthorizerAppid", "wx")).is_err());
	}
}
