//! Thread-safe in-memory stores for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{CacheKey, CachedCredential, TenantCredential, TenantId, TokenSecret, UserProfile},
	crypto,
	store::{
		Clock, CredentialStore, ProfileStore, StoreFuture, StoredProfile, SystemClock,
		TenantDirectory,
	},
};

type EntryMap = Arc<RwLock<HashMap<CacheKey, CachedCredential>>>;

const USER_ID_LEN: usize = 32;

/// Credential store keeping entries in-process; expired entries are dropped on read.
#[derive(Clone)]
pub struct MemoryStore {
	entries: EntryMap,
	clock: Arc<dyn Clock>,
}
impl MemoryStore {
	/// Creates a store driven by `clock`.
	pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
		Self { entries: Default::default(), clock }
	}

	/// Number of entries held, live or not yet evicted.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when nothing has been stored.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	/// Returns the raw entry under `key`, including its expiry.
	pub fn entry(&self, key: &CacheKey) -> Option<CachedCredential> {
		self.entries.read().get(key).cloned()
	}

	fn get_now(&self, key: &CacheKey) -> Option<TokenSecret> {
		let now = self.clock.now();
		let mut guard = self.entries.write();

		match guard.get(key) {
			Some(entry) if entry.is_expired_at(now) => {
				guard.remove(key);

				None
			},
			Some(entry) => Some(entry.value.clone()),
			None => None,
		}
	}
}
impl Default for MemoryStore {
	fn default() -> Self {
		Self::with_clock(Arc::new(SystemClock))
	}
}
impl Debug for MemoryStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemoryStore").field("entries", &self.len()).finish()
	}
}
impl CredentialStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<TokenSecret>> {
		Box::pin(async move { Ok(self.get_now(key)) })
	}

	fn set<'a>(
		&'a self,
		key: &'a CacheKey,
		value: TokenSecret,
		ttl: Option<Duration>,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let entry = CachedCredential::new(value, self.clock.now(), ttl);

			self.entries.write().insert(key.clone(), entry);

			Ok(())
		})
	}
}

/// Tenant directory backed by a map; the host application registers credentials.
#[derive(Clone, Debug, Default)]
pub struct MemoryTenantDirectory(Arc<RwLock<HashMap<TenantId, TenantCredential>>>);
impl MemoryTenantDirectory {
	/// Registers or replaces a tenant's credential.
	pub fn insert(&self, credential: TenantCredential) {
		self.0.write().insert(credential.tenant_id.clone(), credential);
	}

	/// Removes a tenant, e.g. after an `unauthorized` push.
	pub fn remove(&self, tenant: &TenantId) -> Option<TenantCredential> {
		self.0.write().remove(tenant)
	}
}
impl TenantDirectory for MemoryTenantDirectory {
	fn credential<'a>(&'a self, tenant: &'a TenantId) -> StoreFuture<'a, Option<TenantCredential>> {
		Box::pin(async move { Ok(self.0.read().get(tenant).cloned()) })
	}
}

/// Profile store backed by a map keyed by `openid`.
#[derive(Clone, Debug, Default)]
pub struct MemoryProfileStore(Arc<RwLock<HashMap<String, StoredProfile>>>);
impl MemoryProfileStore {
	/// Number of stored profiles.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no profile has been stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn upsert_now(&self, profile: UserProfile) -> StoredProfile {
		let mut guard = self.0.write();

		match guard.get_mut(&profile.openid) {
			Some(stored) => {
				stored.profile.merge_from(profile);

				StoredProfile { created: false, ..stored.clone() }
			},
			None => {
				let stored = StoredProfile {
					user_id: crypto::random_string(USER_ID_LEN).to_ascii_lowercase(),
					profile,
					created: true,
				};

				guard.insert(stored.profile.openid.clone(), StoredProfile {
					created: false,
					..stored.clone()
				});

				stored
			},
		}
	}
}
impl ProfileStore for MemoryProfileStore {
	fn upsert(&self, profile: UserProfile) -> StoreFuture<'_, StoredProfile> {
		Box::pin(async move { Ok(self.upsert_now(profile)) })
	}

	fn get<'a>(&'a self, openid: &'a str) -> StoreFuture<'a, Option<StoredProfile>> {
		Box::pin(async move { Ok(self.0.read().get(openid).cloned()) })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::store::ManualClock;

	fn key() -> CacheKey {
		CacheKey::custom("component:wx1:access_token")
	}

	#[tokio::test]
	async fn entries_expire_lazily() {
		let clock = ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC));
		let store = MemoryStore::with_clock(Arc::new(clock.clone()));

		store
			.set(&key(), "T1".into(), Some(Duration::seconds(300)))
			.await
			.expect("Set should succeed.");
		clock.advance(Duration::seconds(299));

		assert_eq!(store.get(&key()).await.expect("Get should succeed."), Some("T1".into()));

		clock.advance(Duration::seconds(1));

		assert_eq!(store.get(&key()).await.expect("Get should succeed."), None);
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn entries_without_ttl_persist_until_overwritten() {
		let clock = ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC));
		let store = MemoryStore::with_clock(Arc::new(clock.clone()));

		store.set(&key(), "ticket-1".into(), None).await.expect("Set should succeed.");
		clock.advance(Duration::days(365));

		assert_eq!(store.get(&key()).await.expect("Get should succeed."), Some("ticket-1".into()));

		store.set(&key(), "ticket-2".into(), None).await.expect("Set should succeed.");

		assert_eq!(store.get(&key()).await.expect("Get should succeed."), Some("ticket-2".into()));
		assert_eq!(store.entry(&key()).and_then(|entry| entry.expires_at), None);
	}

	#[tokio::test]
	async fn profile_upsert_creates_then_merges() {
		let store = MemoryProfileStore::default();
		let first = store
			.upsert(UserProfile {
				openid: "o1".into(),
				nickname: Some("Ann".into()),
				city: Some("Hangzhou".into()),
				subscribe: 1,
				..Default::default()
			})
			.await
			.expect("Upsert should succeed.");

		assert!(first.created);

		let second = store
			.upsert(UserProfile { openid: "o1".into(), subscribe: 0, ..Default::default() })
			.await
			.expect("Upsert should succeed.");

		assert!(!second.created);
		assert_eq!(second.user_id, first.user_id);
		assert_eq!(second.profile.subscribe, 0);
		assert_eq!(second.profile.city.as_deref(), Some("Hangzhou"));
		assert_eq!(store.len(), 1);
	}

	#[tokio::test]
	async fn tenant_directory_round_trips_credentials() {
		let directory = MemoryTenantDirectory::default();
		let tenant = TenantId::new("wxtenant").expect("Tenant fixture should be valid.");

		assert_eq!(directory.credential(&tenant).await.expect("Lookup should succeed."), None);

		directory.insert(TenantCredential::new(tenant.clone(), "refresh-1"));

		let found = directory
			.credential(&tenant)
			.await
			.expect("Lookup should succeed.")
			.expect("Tenant should be registered.");

		assert_eq!(found.refresh_token.expose(), "refresh-1");
		assert!(directory.remove(&tenant).is_some());
	}
}
