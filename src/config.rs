//! Process configuration for the component identity and end-user sessions.
//!
//! Both structs deserialize from any serde source and can also be read from the
//! environment with the variable names listed on each field.

// self
use crate::{
	_prelude::*,
	auth::{AppId, TokenSecret},
	crypto::{EnvelopeCodec, SessionSealer},
	error::ConfigError,
};

/// Default lifetime of a session token.
pub const DEFAULT_SESSION_TTL: Duration = Duration::days(7);
/// Largest accepted `SESSION_TTL_DAYS`.
pub const MAX_SESSION_TTL_DAYS: i64 = 3650;
/// Default cookie carrying the session token.
pub const DEFAULT_SESSION_COOKIE: &str = "user_token";

/// Identity of the third-party component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentConfig {
	/// `COMPONENT_APP_ID`.
	pub app_id: AppId,
	/// `COMPONENT_APP_SECRET`.
	pub app_secret: TokenSecret,
	/// `COMPONENT_MSG_TOKEN`, the signature token for envelopes.
	pub msg_token: TokenSecret,
	/// `COMPONENT_MSG_KEY`, the 43-character envelope key.
	pub msg_key: TokenSecret,
}
impl ComponentConfig {
	/// Reads the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads the configuration through an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		Ok(Self {
			app_id: AppId::new(required(&lookup, "COMPONENT_APP_ID")?)?,
			app_secret: required(&lookup, "COMPONENT_APP_SECRET")?.into(),
			msg_token: required(&lookup, "COMPONENT_MSG_TOKEN")?.into(),
			msg_key: required(&lookup, "COMPONENT_MSG_KEY")?.into(),
		})
	}

	/// Builds the envelope codec bound to this component.
	pub fn envelope_codec(&self) -> Result<EnvelopeCodec, ConfigError> {
		EnvelopeCodec::new(self.app_id.clone(), self.msg_token.clone(), self.msg_key.expose())
	}
}

/// End-user session settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
	/// `AES_KEY_SEED`, the secret the sealing key is derived from.
	pub key_seed: TokenSecret,
	/// `SESSION_TTL_DAYS`, defaults to seven days and is at most [`MAX_SESSION_TTL_DAYS`].
	#[serde(default = "default_ttl")]
	pub ttl: Duration,
	/// Cookie name the artifact is delivered under.
	#[serde(default = "default_cookie")]
	pub cookie_name: String,
}
impl SessionConfig {
	/// Creates a configuration with the default lifetime and cookie name.
	pub fn new(key_seed: impl Into<TokenSecret>) -> Self {
		Self { key_seed: key_seed.into(), ttl: DEFAULT_SESSION_TTL, cookie_name: default_cookie() }
	}

	/// Reads the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads the configuration through an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut config = Self::new(required(&lookup, "AES_KEY_SEED")?);

		if let Some(days) = lookup("SESSION_TTL_DAYS") {
			let days = days
				.trim()
				.parse::<i64>()
				.ok()
				.filter(|days| (1..=MAX_SESSION_TTL_DAYS).contains(days))
				.ok_or(ConfigError::InvalidEnv { name: "SESSION_TTL_DAYS" })?;

			config.ttl = Duration::days(days);
		}

		Ok(config)
	}

	/// Builds the sealer for session tokens.
	pub fn sealer(&self) -> SessionSealer {
		SessionSealer::new(self.key_seed.expose())
	}
}

fn default_ttl() -> Duration {
	DEFAULT_SESSION_TTL
}

fn default_cookie() -> String {
	DEFAULT_SESSION_COOKIE.to_owned()
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	lookup(name).filter(|value| !value.is_empty()).ok_or(ConfigError::MissingEnv { name })
}
