// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::obs::{self, CacheEvent};

/// Per-cache counters; every event is also forwarded to [`obs::record_cache_event`].
#[derive(Debug, Default)]
pub struct CacheMetrics {
	hits: AtomicU64,
	misses: AtomicU64,
	stored: AtomicU64,
	uncached: AtomicU64,
	failures: AtomicU64,
}
impl CacheMetrics {
	/// Lookups answered from the store.
	pub fn hits(&self) -> u64 {
		self.hits.load(Ordering::Relaxed)
	}

	/// Lookups that triggered a fetch.
	pub fn misses(&self) -> u64 {
		self.misses.load(Ordering::Relaxed)
	}

	/// Fetched values written back with a TTL.
	pub fn stored(&self) -> u64 {
		self.stored.load(Ordering::Relaxed)
	}

	/// Fetched values handed out without caching (TTL not positive).
	pub fn uncached(&self) -> u64 {
		self.uncached.load(Ordering::Relaxed)
	}

	/// Fetches that failed.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record(&self, event: CacheEvent) {
		let counter = match event {
			CacheEvent::Hit => &self.hits,
			CacheEvent::Miss => &self.misses,
			CacheEvent::Stored => &self.stored,
			CacheEvent::Uncached => &self.uncached,
			CacheEvent::Failure => &self.failures,
		};

		counter.fetch_add(1, Ordering::Relaxed);
		obs::record_cache_event(event);
	}
}
