// self
use crate::obs::{CacheEvent, FlowKind, FlowOutcome};

/// Increments `component_broker_flow_total{flow, outcome}` when the `metrics` feature is on.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"component_broker_flow_total",
		"flow" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Increments `component_broker_cache_total{event}` when the `metrics` feature is on.
pub fn record_cache_event(event: CacheEvent) {
	#[cfg(feature = "metrics")]
	metrics::counter!("component_broker_cache_total", "event" => event.as_str()).increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = event;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_without_a_recorder_is_silent() {
		record_flow_outcome(FlowKind::WebAuth, FlowOutcome::Failure);
		record_cache_event(CacheEvent::Miss);
	}
}
