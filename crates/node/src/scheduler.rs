// Path: crates/node/src/scheduler.rs

//! One cancellable periodic task per running chain.

use crate::chain::{Chain, ChainStatus};
use dashmap::DashMap;
use futures::FutureExt;
use poc_api::chain::BlockHeaderService;
use poc_api::time::Clock;
use poc_consensus::{RoundManager, TickReport};
use poc_telemetry::time::TickTimer;
use poc_types::app::ChainId;
use poc_types::error::{ChainError, ErrorCode};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::Instrument;

/// Everything a tick needs besides the chain itself.
#[derive(Clone)]
pub struct TickContext {
    pub headers: Arc<dyn BlockHeaderService>,
    pub rounds: Arc<RoundManager>,
    pub clock: Arc<dyn Clock>,
}

/// Runs one tick of `chain` under its state lock.
///
/// New headers are pulled, missed slots punished and the round rotated. A
/// consensus error marks the chain `Failed`: it cannot schedule safely any more.
pub async fn drive_chain_tick(chain: &Chain, ctx: &TickContext) -> Result<TickReport, ChainError> {
    let chain_id = chain.chain_id();
    let _timer = TickTimer::start(chain_id);
    let mut state = chain.state().lock().await;
    if chain.status() != ChainStatus::Running {
        return Ok(TickReport::default());
    }

    let since = state.last_height();
    let headers = ctx.headers.headers_after(chain_id, since).await?;
    let now = ctx.clock.now_millis();

    match ctx.rounds.tick(&mut state, now, headers) {
        Ok(report) => {
            chain.publish_round(state.round.as_ref());
            if report.advanced.is_some() || !report.missed_slots.is_empty() {
                tracing::debug!(
                    target: "consensus",
                    chain_id,
                    round = ?report.round_index,
                    advanced = ?report.advanced,
                    missed = report.missed_slots.len(),
                    "Tick applied"
                );
            }
            Ok(report)
        }
        Err(e @ ChainError::Consensus(_)) => {
            tracing::error!(
                target: "consensus",
                chain_id,
                code = e.code(),
                error = %e,
                "Chain cannot schedule; marking failed"
            );
            chain.set_status(ChainStatus::Failed);
            Err(e)
        }
        Err(e) => Err(e),
    }
}

/// The tick period of a chain: half a slot, so a missed slot is seen within half a slot.
pub fn tick_period(packing_interval_ms: u64) -> Duration {
    Duration::from_millis((packing_interval_ms / 2).max(1))
}

struct ScheduledTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the scheduler task of every running chain.
pub struct SchedulerManager {
    ctx: TickContext,
    tasks: DashMap<ChainId, ScheduledTask>,
}

impl SchedulerManager {
    pub fn new(ctx: TickContext) -> Self {
        Self {
            ctx,
            tasks: DashMap::new(),
        }
    }

    pub fn context(&self) -> &TickContext {
        &self.ctx
    }

    /// Starts the periodic task of `chain`. Returns `false` if one is already running.
    pub fn create_chain_scheduler(&self, chain: Arc<Chain>) -> bool {
        let chain_id = chain.chain_id();
        if let Some(existing) = self.tasks.get(&chain_id) {
            if !existing.handle.is_finished() {
                return false;
            }
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let span = chain.loggers().consensus.clone();
        let handle = tokio::spawn(
            run_chain_ticker(chain, self.ctx.clone(), shutdown_rx).instrument(span),
        );
        self.tasks.insert(chain_id, ScheduledTask { shutdown, handle });
        true
    }

    /// Cancels the task of `chain_id` and waits for it to exit.
    ///
    /// A tick already in flight runs to completion; no tick starts after this
    /// returns. Other chains' tasks are unaffected.
    pub async fn cancel(&self, chain_id: ChainId) -> bool {
        let Some((_, task)) = self.tasks.remove(&chain_id) else {
            return false;
        };
        let _ = task.shutdown.send(true);
        if let Err(e) = task.handle.await {
            tracing::error!(target: "consensus", chain_id, error = %e, "Scheduler task ended abnormally");
        }
        true
    }

    pub fn is_scheduled(&self, chain_id: ChainId) -> bool {
        self.tasks
            .get(&chain_id)
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }
}

async fn run_chain_ticker(chain: Arc<Chain>, ctx: TickContext, mut shutdown_rx: watch::Receiver<bool>) {
    let chain_id = chain.chain_id();
    let period = tick_period(chain.config().packing_interval);
    tracing::info!(
        target: "consensus",
        chain_id,
        period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
        "Scheduler started"
    );

    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let result = AssertUnwindSafe(drive_chain_tick(&chain, &ctx)).catch_unwind().await;
                match result {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) if chain.status() == ChainStatus::Failed => {
                        tracing::error!(target: "consensus", chain_id, error = %e, "Scheduler stopping on fatal error");
                        break;
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(
                            target: "consensus",
                            chain_id,
                            retryable = e.is_retryable(),
                            error = %e,
                            "Tick failed; retrying next tick"
                        );
                    }
                    Err(panic) => {
                        tracing::error!(target: "consensus", chain_id, "Tick panicked: {:?}. Continuing loop.", panic);
                    }
                }
            }
        }
    }
    tracing::info!(target: "consensus", chain_id, "Scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_period_is_half_a_slot() {
        assert_eq!(tick_period(10_000), Duration::from_millis(5_000));
        assert_eq!(tick_period(1), Duration::from_millis(1));
    }
}
