//! Get-or-fetch cache over a [`CredentialStore`].
//!
//! A miss calls the supplied fetch closure and stores its value for the declared
//! lifetime minus [`EXPIRY_MARGIN`](crate::auth::EXPIRY_MARGIN). Values whose
//! adjusted lifetime is not positive are returned but never stored, so every call
//! fetches again.
//!
//! Concurrent misses on one key each fetch and the last write wins. Enable
//! [`CredentialCache::with_single_flight`] to make concurrent callers in this
//! process wait for the first fetch instead.

mod metrics;

pub use metrics::CacheMetrics;

// self
use crate::{
	_prelude::*,
	auth::{CacheKey, FetchedCredential, TokenSecret},
	obs::CacheEvent,
	store::CredentialStore,
};

/// Credential cache shared by every broker flow.
pub struct CredentialCache {
	store: Arc<dyn CredentialStore>,
	metrics: Arc<CacheMetrics>,
	single_flight: bool,
	flights: Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>,
}
impl CredentialCache {
	/// Wraps a store.
	pub fn new(store: Arc<dyn CredentialStore>) -> Self {
		Self {
			store,
			metrics: Default::default(),
			single_flight: false,
			flights: Default::default(),
		}
	}

	/// Serializes concurrent misses per key inside this process.
	pub fn with_single_flight(mut self, enabled: bool) -> Self {
		self.single_flight = enabled;

		self
	}

	/// Backing store.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Counters for this cache.
	pub fn metrics(&self) -> &CacheMetrics {
		&self.metrics
	}

	/// Returns the live value under `key` without fetching.
	pub async fn get(&self, key: &CacheKey) -> Result<Option<TokenSecret>> {
		Ok(self.store.get(key).await?)
	}

	/// Stores a value that never expires on its own.
	pub async fn set_persistent(&self, key: &CacheKey, value: TokenSecret) -> Result<()> {
		Ok(self.store.set(key, value, None).await?)
	}

	/// Writes a freshly fetched value, honoring the expiry margin.
	///
	/// Returns `false` when the value was too short-lived to store.
	pub async fn put(&self, key: &CacheKey, fetched: &FetchedCredential) -> Result<bool> {
		match fetched.cache_ttl() {
			Some(ttl) => {
				self.store.set(key, fetched.value.clone(), Some(ttl)).await?;
				self.metrics.record(CacheEvent::Stored);

				tracing::debug!(%key, ttl_secs = ttl.whole_seconds(), "Cached credential.");

				Ok(true)
			},
			None => {
				self.metrics.record(CacheEvent::Uncached);

				tracing::debug!(%key, expires_in = fetched.expires_in, "Credential too short-lived to cache.");

				Ok(false)
			},
		}
	}

	/// Returns the cached value under `key`, or runs `fetch` and caches its result.
	pub async fn get_or_fetch<F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<TokenSecret>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<FetchedCredential>>,
	{
		if let Some(value) = self.lookup(key).await? {
			return Ok(value);
		}

		if !self.single_flight {
			return self.fetch_and_store(key, fetch).await;
		}

		let flight = self.flight(key);
		let result = self.fetch_in_flight(key, &flight, fetch).await;

		self.release_flight(key, flight);

		result
	}

	/// Number of keys with a single-flight lock currently allocated.
	pub fn flights_in_use(&self) -> usize {
		self.flights.lock().len()
	}

	async fn fetch_in_flight<F, Fut>(
		&self,
		key: &CacheKey,
		flight: &AsyncMutex<()>,
		fetch: F,
	) -> Result<TokenSecret>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<FetchedCredential>>,
	{
		let _singleflight = flight.lock().await;

		// Another caller may have filled the key while this one waited.
		if let Some(value) = self.store.get(key).await? {
			self.metrics.record(CacheEvent::Hit);

			return Ok(value);
		}

		self.fetch_and_store(key, fetch).await
	}

	async fn lookup(&self, key: &CacheKey) -> Result<Option<TokenSecret>> {
		let value = self.store.get(key).await?;

		if value.is_some() {
			self.metrics.record(CacheEvent::Hit);

			tracing::debug!(%key, "Cache hit.");
		} else {
			self.metrics.record(CacheEvent::Miss);

			tracing::debug!(%key, "Cache miss.");
		}

		Ok(value)
	}

	async fn fetch_and_store<F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<TokenSecret>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<FetchedCredential>>,
	{
		let fetched = match fetch().await {
			Ok(fetched) => fetched,
			Err(e) => {
				self.metrics.record(CacheEvent::Failure);

				return Err(e);
			},
		};

		self.put(key, &fetched).await?;

		Ok(fetched.value)
	}

	fn flight(&self, key: &CacheKey) -> Arc<AsyncMutex<()>> {
		let mut flights = self.flights.lock();

		flights.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	// Handles are cloned and dropped under the map lock, so a count of two (map and
	// caller) means no other caller holds or awaits this flight.
	fn release_flight(&self, key: &CacheKey, flight: Arc<AsyncMutex<()>>) {
		let mut flights = self.flights.lock();

		if Arc::strong_count(&flight) == 2 {
			flights.remove(key);
		}

		drop(flight);
	}
}
impl Debug for CredentialCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialCache")
			.field("single_flight", &self.single_flight)
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}
