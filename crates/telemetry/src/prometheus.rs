// Path: crates/telemetry/src/prometheus.rs
//! Prometheus-backed implementation of the metrics sinks.

use crate::sinks::{ChainMetricsSink, ConsensusMetricsSink, SINK};
use once_cell::sync::OnceCell;
use prometheus::{
    exponential_buckets, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    HistogramVec, IntCounterVec, IntGaugeVec,
};

static ROUNDS_COMPUTED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static CARDS_ISSUED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static ELIGIBLE_AGENTS: OnceCell<IntGaugeVec> = OnceCell::new();
static TICK_DURATION_SECONDS: OnceCell<HistogramVec> = OnceCell::new();
static CHAIN_STATUS: OnceCell<IntGaugeVec> = OnceCell::new();
static TX_REJECTED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

/// Every status label `set_chain_status` may report; the gauge is one-hot over these.
const CHAIN_STATUSES: [&str; 6] = [
    "unconfigured",
    "initialized",
    "running",
    "stopped",
    "failed",
    "deleted",
];

#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

static PROMETHEUS_SINK: PrometheusSink = PrometheusSink;

impl ConsensusMetricsSink for PrometheusSink {
    fn inc_rounds_computed(&self, chain_id: u32) {
        if let Some(m) = ROUNDS_COMPUTED_TOTAL.get() {
            m.with_label_values(&[&chain_id.to_string()]).inc();
        }
    }
    fn inc_cards_issued(&self, chain_id: u32, color: &'static str) {
        if let Some(m) = CARDS_ISSUED_TOTAL.get() {
            m.with_label_values(&[&chain_id.to_string(), color]).inc();
        }
    }
    fn set_eligible_agents(&self, chain_id: u32, count: u64) {
        if let Some(m) = ELIGIBLE_AGENTS.get() {
            m.with_label_values(&[&chain_id.to_string()])
                .set(i64::try_from(count).unwrap_or(i64::MAX));
        }
    }
    fn observe_tick_duration(&self, chain_id: u32, duration_secs: f64) {
        if let Some(m) = TICK_DURATION_SECONDS.get() {
            m.with_label_values(&[&chain_id.to_string()])
                .observe(duration_secs);
        }
    }
}

impl ChainMetricsSink for PrometheusSink {
    fn set_chain_status(&self, chain_id: u32, status: &'static str) {
        if let Some(m) = CHAIN_STATUS.get() {
            let chain = chain_id.to_string();
            for s in CHAIN_STATUSES {
                m.with_label_values(&[&chain, s])
                    .set(i64::from(s == status));
            }
        }
    }
    fn inc_tx_rejected(&self, chain_id: u32, code: &'static str) {
        if let Some(m) = TX_REJECTED_TOTAL.get() {
            m.with_label_values(&[&chain_id.to_string(), code]).inc();
        }
    }
}

/// Registers every collector with the default Prometheus registry and installs
/// `PrometheusSink` as the global sink. Calling it twice is an error.
pub fn install() -> Result<(), anyhow::Error> {
    let _ = ROUNDS_COMPUTED_TOTAL.set(register_int_counter_vec!(
        "poc_rounds_computed_total",
        "Rounds computed, per chain.",
        &["chain_id"]
    )?);
    let _ = CARDS_ISSUED_TOTAL.set(register_int_counter_vec!(
        "poc_cards_issued_total",
        "Punishment cards issued, per chain and color.",
        &["chain_id", "color"]
    )?);
    let _ = ELIGIBLE_AGENTS.set(register_int_gauge_vec!(
        "poc_eligible_agents",
        "Agents scheduled in the current round.",
        &["chain_id"]
    )?);
    let _ = TICK_DURATION_SECONDS.set(register_histogram_vec!(
        "poc_scheduler_tick_duration_seconds",
        "Duration of one scheduler tick.",
        &["chain_id"],
        exponential_buckets(0.0005, 2.0, 14)?
    )?);
    let _ = CHAIN_STATUS.set(register_int_gauge_vec!(
        "poc_chain_status",
        "Lifecycle status of each chain (1 = current).",
        &["chain_id", "status"]
    )?);
    let _ = TX_REJECTED_TOTAL.set(register_int_counter_vec!(
        "poc_tx_rejected_total",
        "Consensus transactions rejected, per chain and error code.",
        &["chain_id", "code"]
    )?);

    SINK.set(&PROMETHEUS_SINK)
        .map_err(|_| anyhow::anyhow!("metrics sink already installed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{chain_metrics, consensus_metrics};

    #[test]
    fn installed_sink_feeds_the_default_registry() {
        install().unwrap();
        assert!(install().is_err());

        chain_metrics().set_chain_status(4, "running");
        chain_metrics().set_chain_status(4, "stopped");
        chain_metrics().inc_tx_rejected(4, "TX_PARSE");
        consensus_metrics().inc_cards_issued(4, "yellow");
        consensus_metrics().observe_tick_duration(4, 0.002);

        let families = ::prometheus::gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        for expected in [
            "poc_chain_status",
            "poc_tx_rejected_total",
            "poc_cards_issued_total",
            "poc_scheduler_tick_duration_seconds",
        ] {
            assert!(names.contains(&expected), "{expected} not registered");
        }

        let status = CHAIN_STATUS.get().unwrap();
        assert_eq!(status.with_label_values(&["4", "running"]).get(), 0);
        assert_eq!(status.with_label_values(&["4", "stopped"]).get(), 1);
    }
}
