//! Storage contracts consumed by the broker and their built-in implementations.
//!
//! - [`CredentialStore`]: key/value with optional TTL; backs the credential cache.
//! - [`TenantDirectory`]: tenant id to refresh credential lookup.
//! - [`ProfileStore`]: end-user profile upserts keyed by `openid`.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::{MemoryProfileStore, MemoryStore, MemoryTenantDirectory};

// self
use crate::{
	_prelude::*,
	auth::{CacheKey, TenantCredential, TenantId, TokenSecret, UserProfile},
};

/// Boxed future returned by store contracts.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Key/value store with per-entry TTL.
///
/// Implementations enforce expiry themselves: `get` never returns an entry whose
/// TTL has elapsed. A `None` TTL stores the value until it is overwritten.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the live value stored under `key`.
	fn get<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<TokenSecret>>;

	/// Stores or replaces the value under `key`.
	fn set<'a>(
		&'a self,
		key: &'a CacheKey,
		value: TokenSecret,
		ttl: Option<Duration>,
	) -> StoreFuture<'a, ()>;
}

/// Read-only view of authorized tenants.
pub trait TenantDirectory
where
	Self: Send + Sync,
{
	/// Looks up the refresh credential registered for `tenant`.
	fn credential<'a>(&'a self, tenant: &'a TenantId) -> StoreFuture<'a, Option<TenantCredential>>;
}

/// Persistence for end-user profiles produced by web authorization.
pub trait ProfileStore
where
	Self: Send + Sync,
{
	/// Creates the profile when its `openid` is unknown, otherwise field-merges it.
	fn upsert(&self, profile: UserProfile) -> StoreFuture<'_, StoredProfile>;

	/// Loads a profile by `openid`.
	fn get<'a>(&'a self, openid: &'a str) -> StoreFuture<'a, Option<StoredProfile>>;
}

/// Profile record as persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredProfile {
	/// Persistent identifier sealed into session tokens.
	pub user_id: String,
	/// Merged profile.
	pub profile: UserProfile,
	/// `true` when the upsert created the record.
	#[serde(skip)]
	pub created: bool,
}

/// Error type produced by store implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Source of the current instant for TTL bookkeeping.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Returns the current instant.
	fn now(&self) -> OffsetDateTime;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Clock that only moves when told to.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Starts the clock at `start`.
	pub fn new(start: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(start)))
	}

	/// Moves the clock forward.
	pub fn advance(&self, by: Duration) {
		*self.0.lock() += by;
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}
