//! Tenant credentials, cache entries, and the key namespaces they live under.

// self
use crate::{
	_prelude::*,
	auth::{AppId, TenantId, TokenSecret},
};

/// Seconds shaved off every upstream-declared expiry before caching.
pub const EXPIRY_MARGIN: Duration = Duration::seconds(300);
/// Longest TTL any fetched value is stored with.
pub const MAX_CACHE_TTL: Duration = Duration::days(30);

/// Long-lived authorization of one sub-account, owned by the persistence layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantCredential {
	/// Upstream app identifier of the tenant.
	pub tenant_id: TenantId,
	/// Refresh credential; rotates on re-authorization.
	pub refresh_token: TokenSecret,
	/// Scope identifiers granted during authorization, in upstream order.
	#[serde(default)]
	pub granted_scopes: Vec<String>,
}
impl TenantCredential {
	/// Creates a credential with no recorded scopes.
	pub fn new(tenant_id: TenantId, refresh_token: impl Into<TokenSecret>) -> Self {
		Self { tenant_id, refresh_token: refresh_token.into(), granted_scopes: Vec::new() }
	}

	/// Replaces the granted scope list.
	pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.granted_scopes = scopes.into_iter().map(Into::into).collect();

		self
	}
}

/// Entry held by a credential store.
///
/// `expires_at == None` means the entry never expires on its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCredential {
	/// Token or ticket value.
	pub value: TokenSecret,
	/// Absolute expiry instant, if any.
	pub expires_at: Option<OffsetDateTime>,
}
impl CachedCredential {
	/// Creates an entry that expires `ttl` after `now`, or never when `ttl` is `None`.
	///
	/// An expiry past the representable range saturates instead of overflowing.
	pub fn new(value: TokenSecret, now: OffsetDateTime, ttl: Option<Duration>) -> Self {
		Self { value, expires_at: ttl.map(|ttl| now.saturating_add(ttl)) }
	}

	/// Returns `true` if the entry has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| instant >= expires_at)
	}
}

/// Result of a successful upstream credential fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedCredential {
	/// Token or ticket value.
	pub value: TokenSecret,
	/// Lifetime declared by upstream, in seconds.
	pub expires_in: i64,
}
impl FetchedCredential {
	/// Wraps a fetched value and its declared lifetime.
	pub fn new(value: impl Into<TokenSecret>, expires_in: i64) -> Self {
		Self { value: value.into(), expires_in }
	}

	/// TTL to store the value with: the declared lifetime minus [`EXPIRY_MARGIN`],
	/// capped at [`MAX_CACHE_TTL`].
	///
	/// Returns `None` when the result is not positive; such values are handed out
	/// once and never cached.
	pub fn cache_ttl(&self) -> Option<Duration> {
		let ttl = Duration::seconds(self.expires_in).checked_sub(EXPIRY_MARGIN)?;

		ttl.is_positive().then(|| ttl.min(MAX_CACHE_TTL))
	}
}

/// Auxiliary ticket kinds minted from a tenant access token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
	/// JS-SDK ticket.
	JsApi,
	/// Card API ticket.
	Card,
}
impl TicketKind {
	/// Returns the upstream `type` parameter for the ticket.
	pub const fn as_str(self) -> &'static str {
		match self {
			TicketKind::JsApi => "jsapi",
			TicketKind::Card => "wx_card",
		}
	}
}
impl Display for TicketKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Namespaced key under which a credential is cached.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);
impl CacheKey {
	/// Key of the verify ticket pushed by the platform.
	pub fn verify_ticket(app: &AppId) -> Self {
		Self(format!("component:{app}:verify_ticket"))
	}

	/// Key of the component (master) access token.
	pub fn master_token(app: &AppId) -> Self {
		Self(format!("component:{app}:access_token"))
	}

	/// Key of a tenant access token.
	pub fn tenant_token(tenant: &TenantId) -> Self {
		Self(format!("authorizer:{tenant}:access_token"))
	}

	/// Key of an auxiliary ticket for a tenant.
	pub fn ticket(tenant: &TenantId, kind: TicketKind) -> Self {
		Self(format!("authorizer:{tenant}:ticket:{kind}"))
	}

	/// Builds a key from an arbitrary string, for custom namespaces.
	pub fn custom(raw: impl Into<String>) -> Self {
		Self(raw.into())
	}

	/// Returns the key text.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Debug for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "CacheKey({})", self.0)
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
