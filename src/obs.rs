//! Observability helpers for broker flows.
//!
//! Spans are always emitted through `tracing` as `component_broker.flow` with the
//! `flow` and `stage` fields. Enable the `metrics` feature to also increment the
//! `component_broker_flow_total` counter, labeled by `flow` + `outcome`, and the
//! `component_broker_cache_total` counter, labeled by `event`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Broker operations observed by spans and metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Envelope decryption or encryption.
	Envelope,
	/// Inbound component push handling.
	ComponentPush,
	/// Master (component) access token.
	MasterToken,
	/// Pre-authorization code.
	PreAuthCode,
	/// Authorization code exchange and tenant info lookups.
	Authorization,
	/// Tenant access token refresh.
	TenantToken,
	/// JS-SDK or card ticket.
	Ticket,
	/// End-user web authorization callback.
	WebAuth,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Envelope => "envelope",
			FlowKind::ComponentPush => "component_push",
			FlowKind::MasterToken => "master_token",
			FlowKind::PreAuthCode => "pre_auth_code",
			FlowKind::Authorization => "authorization",
			FlowKind::TenantToken => "tenant_token",
			FlowKind::Ticket => "ticket",
			FlowKind::WebAuth => "web_auth",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a broker helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Credential cache events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheEvent {
	/// Lookup answered from the store.
	Hit,
	/// Lookup that will fetch.
	Miss,
	/// Fetched value written with a TTL.
	Stored,
	/// Fetched value too short-lived to store.
	Uncached,
	/// Fetch failed.
	Failure,
}
impl CacheEvent {
	/// Returns a stable label suitable for metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CacheEvent::Hit => "hit",
			CacheEvent::Miss => "miss",
			CacheEvent::Stored => "stored",
			CacheEvent::Uncached => "uncached",
			CacheEvent::Failure => "failure",
		}
	}
}

/// Records the attempt, runs `op`, then records its outcome.
pub fn observe<T, E>(kind: FlowKind, op: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = op();

	record_flow_outcome(
		kind,
		if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure },
	);

	result
}

/// Async counterpart of [`observe`].
pub async fn observe_async<T, E, Fut>(kind: FlowKind, fut: Fut) -> Result<T, E>
where
	Fut: Future<Output = Result<T, E>>,
{
	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = fut.await;

	record_flow_outcome(
		kind,
		if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure },
	);

	result
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn labels_are_stable() {
		assert_eq!(FlowKind::TenantToken.to_string(), "tenant_token");
		assert_eq!(FlowKind::Ticket.as_str(), "ticket");
		assert_eq!(FlowOutcome::Failure.to_string(), "failure");
	}

	#[test]
	fn observe_passes_results_through() {
		assert_eq!(observe::<_, ()>(FlowKind::Envelope, || Ok(7)), Ok(7));
		assert_eq!(observe::<(), _>(FlowKind::Envelope, || Err("bad")), Err("bad"));
	}
}
