//! End-user web authorization on behalf of a tenant.
//!
//! The callback endpoint is reached by a browser redirect, so it has no error
//! channel back to the page that started the flow. [`Broker::handle_authorization_callback`]
//! therefore never fails: every problem is logged and the user is redirected to
//! the original `state` (or `/`) without a session.

// crates.io
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	api::{ApiCall, TransportErrorMapper},
	auth::{OpenId, TenantId, UserProfile},
	config::SessionConfig,
	crypto::{SessionArtifact, SessionSealer},
	error::FormatError,
	flows::Broker,
	http::PlatformHttpClient,
	obs::{self, FlowKind, FlowSpan},
	platform::Endpoint,
	store::{Clock, ProfileStore, StoredProfile, SystemClock},
};

/// Maximum length of the escaped `state` parameter.
pub const STATE_MAX_LEN: usize = 128;
/// Scope requesting the user's profile.
pub const DEFAULT_WEB_SCOPE: &str = "snsapi_userinfo";

const DEFAULT_REDIRECT: &str = "/";
const PROFILE_LANG: &str = "zh_CN";

/// Collaborators and settings for one tenant's web authorization.
#[derive(Clone)]
pub struct WebAuth {
	/// Tenant the end users authorize against.
	pub tenant: TenantId,
	/// Callback URL registered for the flow.
	pub redirect_uri: Url,
	/// Requested scope.
	pub scope: String,
	/// Session settings.
	pub session: SessionConfig,
	/// Where profiles are upserted.
	pub profiles: Arc<dyn ProfileStore>,
	sealer: SessionSealer,
	clock: Arc<dyn Clock>,
}
impl WebAuth {
	/// Creates the flow settings with the profile scope and the system clock.
	pub fn new(
		tenant: TenantId,
		redirect_uri: Url,
		session: SessionConfig,
		profiles: Arc<dyn ProfileStore>,
	) -> Self {
		let sealer = session.sealer();

		Self {
			tenant,
			redirect_uri,
			scope: DEFAULT_WEB_SCOPE.to_owned(),
			session,
			profiles,
			sealer,
			clock: Arc::new(SystemClock),
		}
	}

	/// Overrides the requested scope.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = scope.into();

		self
	}

	/// Overrides the clock used to stamp sessions.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Sealer that mints and opens session tokens.
	pub fn sealer(&self) -> &SessionSealer {
		&self.sealer
	}
}
impl Debug for WebAuth {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("WebAuth")
			.field("tenant", &self.tenant)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("scope", &self.scope)
			.finish_non_exhaustive()
	}
}

/// Query parameters of the callback request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
	/// Authorization code; absent when the user declined.
	pub code: Option<String>,
	/// Opaque state echoed back by the platform.
	pub state: Option<String>,
	/// Tenant app id the platform authorized against.
	#[serde(rename = "appid")]
	pub app_id: Option<String>,
}

/// Why a callback produced no session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
	/// The platform sent no `code`.
	MissingCode,
	/// `appid` does not match the configured tenant.
	AppIdMismatch {
		/// Configured tenant.
		expected: String,
		/// Value received.
		found: Option<String>,
	},
	/// An upstream or store step failed after the checks passed.
	ExchangeFailed {
		/// Rendered error.
		message: String,
	},
}

/// Terminal state of one callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackState {
	/// No credential exchange happened or it did not complete.
	Rejected(RejectReason),
	/// The code was exchanged and a session minted.
	CodeExchanged {
		/// End user.
		openid: String,
		/// Persistent user id sealed into the session.
		user_id: String,
		/// `true` when the profile was created by this callback.
		created: bool,
	},
}

/// What the callback endpoint should answer with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackOutcome {
	/// Redirect target.
	pub redirect_to: String,
	/// Session to set as a cookie, when the exchange completed.
	pub session: Option<SessionArtifact>,
	/// Cookie name for `session`.
	pub cookie_name: String,
	/// Terminal state.
	pub state: CallbackState,
}

#[derive(Deserialize)]
struct WebTokenBody {
	#[serde(deserialize_with = "crate::api::non_empty")]
	access_token: String,
	openid: String,
	#[serde(default)]
	unionid: Option<String>,
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + PlatformHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the URL that sends an end user to the platform's authorization page.
	pub fn authorize_url(&self, web: &WebAuth, state: Option<&str>) -> Result<Url> {
		let mut url = self.descriptor.url(Endpoint::WebAuthorize)?;
		let query = format!(
			"appid={}&redirect_uri={}&response_type=code&scope={}&state={}&component_appid={}",
			escape(&web.tenant),
			escape(web.redirect_uri.as_str()),
			escape(&web.scope),
			escape_state(state),
			escape(self.app_id()),
		);

		url.set_query(Some(&query));
		url.set_fragment(Some("wechat_redirect"));

		Ok(url)
	}

	/// Handles the platform's redirect back to the callback URL.
	pub async fn handle_authorization_callback(
		&self,
		web: &WebAuth,
		params: CallbackParams,
	) -> CallbackOutcome {
		const KIND: FlowKind = FlowKind::WebAuth;

		let span = FlowSpan::new(KIND, "handle_authorization_callback");

		span.instrument(self.callback_inner(web, params)).await
	}

	async fn callback_inner(&self, web: &WebAuth, params: CallbackParams) -> CallbackOutcome {
		let state = params.state.filter(|state| !state.is_empty());
		let rejected = |reason: RejectReason| {
			tracing::warn!(tenant = %web.tenant, ?reason, "Web authorization callback rejected.");

			obs::record_flow_outcome(FlowKind::WebAuth, obs::FlowOutcome::Failure);

			CallbackOutcome {
				redirect_to: state.clone().unwrap_or_else(|| DEFAULT_REDIRECT.to_owned()),
				session: None,
				cookie_name: web.session.cookie_name.clone(),
				state: CallbackState::Rejected(reason),
			}
		};

		obs::record_flow_outcome(FlowKind::WebAuth, obs::FlowOutcome::Attempt);

		let Some(code) = params.code.filter(|code| !code.is_empty()) else {
			return rejected(RejectReason::MissingCode);
		};

		if params.app_id.as_deref() != Some(&*web.tenant) {
			return rejected(RejectReason::AppIdMismatch {
				expected: web.tenant.to_string(),
				found: params.app_id,
			});
		}

		match self.exchange_web_code(web, &code).await {
			Ok((stored, session)) => {
				obs::record_flow_outcome(FlowKind::WebAuth, obs::FlowOutcome::Success);

				tracing::info!(
					tenant = %web.tenant,
					created = stored.created,
					"Web authorization completed."
				);

				CallbackOutcome {
					redirect_to: state
						.as_deref()
						.map_or_else(|| DEFAULT_REDIRECT.to_owned(), |state| format!("{state}?auth")),
					session: Some(session),
					cookie_name: web.session.cookie_name.clone(),
					state: CallbackState::CodeExchanged {
						openid: stored.profile.openid,
						user_id: stored.user_id,
						created: stored.created,
					},
				}
			},
			Err(e) => rejected(RejectReason::ExchangeFailed { message: e.to_string() }),
		}
	}

	async fn exchange_web_code(
		&self,
		web: &WebAuth,
		code: &str,
	) -> Result<(StoredProfile, SessionArtifact)> {
		let master = self.get_master_token().await?;
		let web_token: WebTokenBody = self
			.call(
				ApiCall::new(Endpoint::WebAccessToken)
					.query("appid", &web.tenant)
					.query("code", code)
					.query("grant_type", "authorization_code")
					.query("component_appid", self.app_id())
					.query("component_access_token", master.expose()),
			)
			.await?;
		let openid = OpenId::new(&web_token.openid)
			.map_err(|_| FormatError::MissingElement { element: "openid" })?;
		let profile = self.load_profile(web, &openid, &web_token).await?;
		let stored = web.profiles.upsert(profile).await?;
		let session = web.sealer.seal_at(&stored.user_id, web.clock.now(), web.session.ttl)?;

		Ok((stored, session))
	}

	async fn load_profile(
		&self,
		web: &WebAuth,
		openid: &OpenId,
		web_token: &WebTokenBody,
	) -> Result<UserProfile> {
		let tenant_token = self.get_tenant_token(&web.tenant).await?;
		let mut profile: UserProfile = self
			.call(
				ApiCall::new(Endpoint::UserInfo)
					.query("access_token", tenant_token.expose())
					.query("openid", openid)
					.query("lang", PROFILE_LANG),
			)
			.await?;

		if !profile.is_subscribed() {
			tracing::debug!(%openid, "User does not follow the tenant; skipping full profile.");

			return Ok(UserProfile::unsubscribed(
				openid,
				profile.unionid.take().or_else(|| web_token.unionid.clone()),
			));
		}

		let full: UserProfile = self
			.call(
				ApiCall::new(Endpoint::SnsUserInfo)
					.query("access_token", &web_token.access_token)
					.query("openid", openid)
					.query("lang", PROFILE_LANG),
			)
			.await?;

		profile.merge_from(full);
		profile.subscribe = 1;

		Ok(profile)
	}
}

fn escape(raw: &str) -> String {
	form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// Form-escapes `state` (default `/`) and caps it at [`STATE_MAX_LEN`] characters
/// without splitting a `%XX` escape.
pub fn escape_state(state: Option<&str>) -> String {
	let mut escaped = escape(state.filter(|state| !state.is_empty()).unwrap_or(DEFAULT_REDIRECT));

	if escaped.len() > STATE_MAX_LEN {
		let mut cut = STATE_MAX_LEN;

		// Escapes are three bytes; back up if one straddles the cut.
		if let Some(percent) = escaped[cut.saturating_sub(2)..cut].rfind('%') {
			cut = cut - 2 + percent;
		}

		escaped.truncate(cut);
	}

	escaped
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn state_defaults_to_root() {
		assert_eq!(escape_state(None), "%2F");
		assert_eq!(escape_state(Some("")), "%2F");
		assert_eq!(escape_state(Some("/shop?id=1")), "%2Fshop%3Fid%3D1");
	}

	#[test]
	fn state_is_capped_without_splitting_escapes() {
		let long = "a".repeat(STATE_MAX_LEN + 20);

		assert_eq!(escape_state(Some(&long)).len(), STATE_MAX_LEN);

		// 127 plain characters followed by '/' would put "%2F" across the cut.
		let straddling = format!("{}/tail", "a".repeat(STATE_MAX_LEN - 1));
		let escaped = escape_state(Some(&straddling));

		assert_eq!(escaped.len(), STATE_MAX_LEN - 1);
		assert!(!escaped.contains('%'));

		let one_in = format!("{}/tail", "a".repeat(STATE_MAX_LEN - 2));
		let escaped = escape_state(Some(&one_in));

		assert_eq!(escaped.len(), STATE_MAX_LEN - 2);
	}

	#[test]
	fn callback_params_deserialize_from_query_names() {
		let params: CallbackParams =
			serde_json::from_value(serde_json::json!({ "code": "c", "state": "/x", "appid": "wx1" }))
				.expect("Params should deserialize.");

		assert_eq!(params.app_id.as_deref(), Some("wx1"));
	}
}
