// Path: crates/consensus/src/round.rs

//! Round computation and rotation.
//!
//! A round is a pure function of the active agents (with credits computed for
//! the round's index), the round index and its start time. Nothing about a round
//! is persisted; a restarting node rebuilds it from durable state and the round
//! index and start time carried by the latest block header.

use crate::agent::AgentManager;
use crate::punish::PunishManager;
use crate::state::ChainState;
use poc_telemetry::consensus_metrics;
use poc_types::app::{Agent, BlockHeaderSummary, ChainId, Round, RoundAdvance, RoundMember};
use poc_types::error::{ChainError, ConsensusError};
use std::cmp::Ordering;
use std::sync::Arc;

/// Total packing order: credit descending, then owning address ascending.
///
/// The agent hash settles the (never expected) case of two live agents sharing
/// an address, so the order never depends on cache insertion order.
fn packing_order(a: &Agent, b: &Agent) -> Ordering {
    b.credit
        .cmp(&a.credit)
        .then_with(|| a.agent_address.cmp(&b.agent_address))
        .then_with(|| a.agent_hash.cmp(&b.agent_hash))
}

/// Builds the round `index` starting at `start_time` from agents whose credit
/// was computed for that index.
///
/// Only active agents with non-zero credit are members. An empty member set is
/// an error: the chain has nobody to schedule.
pub fn compute_round(
    chain_id: ChainId,
    index: u64,
    start_time: u64,
    packing_interval: u64,
    agents: &[Agent],
) -> Result<Round, ConsensusError> {
    let mut eligible: Vec<&Agent> = agents
        .iter()
        .filter(|a| a.is_active() && a.credit > 0)
        .collect();
    if eligible.is_empty() {
        return Err(ConsensusError::EmptyEligibleSet {
            chain_id,
            round_index: index,
        });
    }
    eligible.sort_by(|a, b| packing_order(a, b));

    let members = eligible
        .into_iter()
        .zip(0u32..)
        .map(|(a, slot)| RoundMember {
            agent_hash: a.agent_hash,
            agent_address: a.agent_address,
            packing_address: a.packing_address,
            credit: a.credit,
            slot,
        })
        .collect();

    Ok(Round {
        index,
        start_time,
        packing_interval,
        members,
        position: 0,
    })
}

/// What one scheduler tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Headers accepted into the tail.
    pub new_headers: usize,
    /// Slots found empty past their deadline, as `(round index, slot)`.
    pub missed_slots: Vec<(u64, u32)>,
    /// Set if the tick moved the chain to a new round.
    pub advanced: Option<RoundAdvance>,
    /// Stopped agents moved to `Exited`.
    pub exits_finalized: usize,
    /// Index of the current round after the tick.
    pub round_index: Option<u64>,
}

/// Drives round computation and rotation for a chain.
pub struct RoundManager {
    agents: Arc<AgentManager>,
    punishes: Arc<PunishManager>,
}

impl RoundManager {
    pub fn new(agents: Arc<AgentManager>, punishes: Arc<PunishManager>) -> Self {
        Self { agents, punishes }
    }

    /// Computes round `index` from the current caches.
    fn build(
        &self,
        state: &mut ChainState,
        index: u64,
        start_time: u64,
    ) -> Result<Round, ConsensusError> {
        self.agents.refresh_credits(state, index);
        let round = compute_round(
            state.chain_id,
            index,
            start_time,
            state.config.packing_interval,
            &state.agents,
        )?;
        consensus_metrics().inc_rounds_computed(state.chain_id);
        consensus_metrics().set_eligible_agents(state.chain_id, u64::from(round.member_count()));
        Ok(round)
    }

    /// Rolls `round` forward by whole rounds until it contains `now`. Slots
    /// already behind `now` are settled without punishment.
    fn roll_forward(
        &self,
        state: &mut ChainState,
        mut round: Round,
        now: u64,
    ) -> Result<Round, ConsensusError> {
        while now >= round.end_time() {
            let duration = round.duration().max(1);
            let skipped = ((now - round.start_time) / duration).max(1);
            let index = round.index.saturating_add(skipped);
            let start_time = round
                .start_time
                .saturating_add(skipped.saturating_mul(duration));
            round = self.build(state, index, start_time)?;
        }
        round.position = settled_slots(&round, now);
        Ok(round)
    }

    /// Computes the chain's initial round.
    ///
    /// With headers, the latest header's round index and start time are adopted,
    /// so a restart lands in the same round the chain was in. Without, round 1
    /// starts at `now`.
    pub fn init_round(&self, state: &mut ChainState, now: u64) -> Result<Round, ConsensusError> {
        let (index, start) = match state.headers.back() {
            Some(h) => (h.round_index.max(1), h.round_start_time),
            None => (1, now),
        };
        let round = self.build(state, index, start)?;
        let round = self.roll_forward(state, round, now)?;
        tracing::info!(
            target: "consensus",
            chain_id = state.chain_id,
            round = round.index,
            start = round.start_time,
            members = round.member_count(),
            "Initial round computed"
        );
        state.install_round(round.clone());
        state.last_advance = None;
        Ok(round)
    }

    /// One scheduler tick: ingest new headers, punish missed slots, rotate the
    /// round when its end time passes or a header shows a later round.
    ///
    /// An empty eligible set is only tolerated before the first round exists.
    pub fn tick(
        &self,
        state: &mut ChainState,
        now: u64,
        headers: Vec<BlockHeaderSummary>,
    ) -> Result<TickReport, ChainError> {
        let mut report = TickReport {
            new_headers: state.push_headers(headers),
            ..TickReport::default()
        };
        report.exits_finalized = self.agents.finalize_exits(state, now);

        let Some((current_index, current_end)) =
            state.round.as_ref().map(|r| (r.index, r.end_time()))
        else {
            self.try_first_round(state, now, &mut report)?;
            return Ok(report);
        };

        // A header from a later round is authoritative over local arithmetic.
        let header_round = state
            .headers
            .iter()
            .filter(|h| h.round_index > current_index)
            .max_by_key(|h| (h.round_index, h.height))
            .map(|h| (h.round_index, h.round_start_time));

        let next = match header_round {
            Some((index, start)) => Some((index, start, RoundAdvance::ByHeight)),
            None => {
                self.settle_misses(state, now, &mut report)?;
                (now >= current_end).then(|| {
                    (current_index.saturating_add(1), current_end, RoundAdvance::ByTime)
                })
            }
        };

        if let Some((index, start, advance)) = next {
            let mut round = self.build(state, index, start)?;
            // After a stall the new round may already be over too.
            let stalled = now >= round.end_time();
            if stalled {
                round = self.roll_forward(state, round, now)?;
            }
            tracing::info!(
                target: "consensus",
                chain_id = state.chain_id,
                round = round.index,
                start = round.start_time,
                members = round.member_count(),
                advance = ?advance,
                "Round advanced"
            );
            state.install_round(round);
            state.last_advance = Some(advance);
            report.advanced = Some(advance);
            if !stalled {
                self.settle_misses(state, now, &mut report)?;
            }
        }

        report.round_index = state.round.as_ref().map(|r| r.index);
        Ok(report)
    }

    /// Computes the first round once there is someone to schedule.
    fn try_first_round(
        &self,
        state: &mut ChainState,
        now: u64,
        report: &mut TickReport,
    ) -> Result<(), ConsensusError> {
        if state.agents.is_empty() {
            tracing::debug!(
                target: "consensus",
                chain_id = state.chain_id,
                "No agents yet; waiting for the first round"
            );
            return Ok(());
        }
        let index = state
            .headers
            .back()
            .map(|h| h.round_index.saturating_add(1))
            .unwrap_or(1);
        let round = match self.build(state, index, now) {
            Ok(round) => round,
            Err(ConsensusError::EmptyEligibleSet { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };
        tracing::info!(
            target: "consensus",
            chain_id = state.chain_id,
            round = round.index,
            members = round.member_count(),
            "First round computed"
        );
        report.round_index = Some(round.index);
        state.install_round(round);
        Ok(())
    }

    /// Issues a yellow card for every slot past its deadline that no header filled.
    fn settle_misses(
        &self,
        state: &mut ChainState,
        now: u64,
        report: &mut TickReport,
    ) -> Result<(), ChainError> {
        let Some(round) = state.round.clone() else {
            return Ok(());
        };
        let height = state.last_height();

        let mut position = round.position;
        while let Some(deadline) = round.slot_deadline(position) {
            if deadline > now {
                break;
            }
            let filled = state.is_slot_filled(round.index, position);
            if let Some(member) = round.member(position).filter(|_| !filled) {
                report.missed_slots.push((round.index, position));
                tracing::warn!(
                    target: "consensus",
                    chain_id = state.chain_id,
                    round = round.index,
                    slot = position,
                    agent = %member.agent_hash,
                    "Missed slot"
                );
                // A member disqualified earlier in the round is not punished again.
                if state.agent(&member.agent_hash).is_some() {
                    self.punishes
                        .apply_yellow(state, member.agent_hash, height, round.index, now)?;
                }
            }
            position += 1;
        }

        if let Some(r) = state.round.as_mut() {
            r.position = position;
        }
        Ok(())
    }
}

/// Number of slots of `round` whose deadline is not after `now`.
fn settled_slots(round: &Round, now: u64) -> u32 {
    if round.packing_interval == 0 || now < round.start_time {
        return 0;
    }
    let elapsed = (now - round.start_time) / round.packing_interval;
    u32::try_from(elapsed)
        .unwrap_or(u32::MAX)
        .min(round.member_count())
}
