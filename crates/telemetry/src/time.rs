// Path: crates/telemetry/src/time.rs
use crate::sinks::consensus_metrics;
use std::time::Instant;

/// Measures one scheduler tick of one chain. The duration is reported on drop,
/// so early returns and `?` paths are measured too.
pub struct TickTimer {
    chain_id: u32,
    start: Instant,
}

impl TickTimer {
    pub fn start(chain_id: u32) -> Self {
        Self {
            chain_id,
            start: Instant::now(),
        }
    }
}

impl Drop for TickTimer {
    fn drop(&mut self) {
        consensus_metrics().observe_tick_duration(self.chain_id, self.start.elapsed().as_secs_f64());
    }
}
