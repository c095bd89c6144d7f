// Path: crates/telemetry/src/sinks.rs
//! Defines abstract traits for metrics reporting, decoupling core logic from the backend.

use once_cell::sync::OnceCell;

/// A no-op sink for use in tests or when telemetry is disabled.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// A lazily-initialized static reference to the global `MetricsSink` implementation.
pub static SINK: OnceCell<&'static dyn MetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// Returns the configured consensus metrics sink, or a no-op sink.
pub fn consensus_metrics() -> &'static dyn ConsensusMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns the configured chain lifecycle metrics sink, or a no-op sink.
pub fn chain_metrics() -> &'static dyn ChainMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Metrics emitted by round scheduling and punishment.
pub trait ConsensusMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments the counter of computed rounds for a chain.
    fn inc_rounds_computed(&self, chain_id: u32);
    /// Increments the counter of issued cards, labeled by chain and color.
    fn inc_cards_issued(&self, chain_id: u32, color: &'static str);
    /// Sets the gauge of agents eligible for the current round.
    fn set_eligible_agents(&self, chain_id: u32, count: u64);
    /// Observes the duration of a single scheduler tick of a chain.
    fn observe_tick_duration(&self, chain_id: u32, duration_secs: f64);
}
impl ConsensusMetricsSink for NopSink {
    fn inc_rounds_computed(&self, _chain_id: u32) {}
    fn inc_cards_issued(&self, _chain_id: u32, _color: &'static str) {}
    fn set_eligible_agents(&self, _chain_id: u32, _count: u64) {}
    fn observe_tick_duration(&self, _chain_id: u32, _duration_secs: f64) {}
}

/// Metrics emitted by the chain lifecycle.
pub trait ChainMetricsSink: Send + Sync + std::fmt::Debug {
    /// Records the lifecycle status of a chain (one-hot gauge over statuses).
    fn set_chain_status(&self, chain_id: u32, status: &'static str);
    /// Increments the counter of rejected transactions, labeled by error code.
    fn inc_tx_rejected(&self, chain_id: u32, code: &'static str);
}
impl ChainMetricsSink for NopSink {
    fn set_chain_status(&self, _chain_id: u32, _status: &'static str) {}
    fn inc_tx_rejected(&self, _chain_id: u32, _code: &'static str) {}
}

/// A unified sink implementing every domain-specific trait.
pub trait MetricsSink: ConsensusMetricsSink + ChainMetricsSink {}

impl<T> MetricsSink for T where T: ConsensusMetricsSink + ChainMetricsSink {}
