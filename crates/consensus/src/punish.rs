// Path: crates/consensus/src/punish.rs

//! Yellow and red cards.

use crate::agent::AgentManager;
use crate::deposit::DepositManager;
use crate::state::ChainState;
use poc_api::storage::TableStore;
use poc_telemetry::consensus_metrics;
use poc_types::app::{CardColor, PunishReason, PunishRecord, RedPunishTx, TxHash};
use poc_types::codec;
use poc_types::error::{ChainError, ConsensusError, ValidationError};
use poc_types::keys::punish_table;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Returns true if the history holds a red card.
pub fn has_red_card(history: &[PunishRecord]) -> bool {
    history.iter().any(PunishRecord::is_red)
}

/// Counts the yellow cards still inside the punish window at `current_round`.
///
/// A card issued in round `r` counts while `r + window > current_round`.
pub fn yellow_count_in_window(history: &[PunishRecord], current_round: u64, window: u64) -> u32 {
    let count = history
        .iter()
        .filter(|p| p.color == CardColor::Yellow)
        .filter(|p| p.round_index.saturating_add(window) > current_round)
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// What applying a card to an agent's history does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardOutcome {
    /// A card with the same key is already recorded. No state change.
    Duplicate,
    /// The card is appended.
    Recorded,
    /// The card is appended and pushes the yellow count to the threshold, so a
    /// red card must follow.
    Escalated,
}

/// Decides the effect of `card` on `history` without I/O.
pub fn compute_card_outcome(
    history: &[PunishRecord],
    card: &PunishRecord,
    threshold: u32,
    window: u64,
) -> CardOutcome {
    let key = card.key();
    if history.iter().any(|p| p.key() == key) {
        return CardOutcome::Duplicate;
    }
    if card.is_red() || has_red_card(history) {
        return CardOutcome::Recorded;
    }
    let yellows = yellow_count_in_window(history, card.round_index, window).saturating_add(1);
    if yellows >= threshold {
        CardOutcome::Escalated
    } else {
        CardOutcome::Recorded
    }
}

/// Owns the punish table of each chain and the consequences of its cards.
pub struct PunishManager {
    store: Arc<dyn TableStore>,
    agents: Arc<AgentManager>,
    deposits: Arc<DepositManager>,
}

impl PunishManager {
    pub fn new(
        store: Arc<dyn TableStore>,
        agents: Arc<AgentManager>,
        deposits: Arc<DepositManager>,
    ) -> Self {
        Self {
            store,
            agents,
            deposits,
        }
    }

    /// Scans the punish table into the cache, grouped per agent and ordered by height.
    ///
    /// A record that does not decode is fatal: credit computed without it would
    /// differ from the credit other nodes compute.
    pub fn load_punishes(&self, state: &mut ChainState) -> Result<(), ConsensusError> {
        state.punishes.clear();
        let table = punish_table(state.chain_id);
        let entries = match self.store.scan(&table) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    target: "consensus",
                    chain_id = state.chain_id,
                    error = %e,
                    "Punish scan failed; starting with an empty punish cache"
                );
                return Ok(());
            }
        };

        let mut punishes: BTreeMap<TxHash, Vec<PunishRecord>> = BTreeMap::new();
        for (_, value) in entries {
            let record: PunishRecord =
                codec::from_bytes_canonical(&value).map_err(|reason| {
                    ConsensusError::CorruptRecord {
                        table: table.clone(),
                        reason,
                    }
                })?;
            punishes.entry(record.agent_hash).or_default().push(record);
        }
        for history in punishes.values_mut() {
            history.sort_by_key(|p| (p.height, p.round_index, p.reason));
        }
        let total: usize = punishes.values().map(Vec::len).sum();
        state.punishes = punishes;

        tracing::info!(
            target: "consensus",
            chain_id = state.chain_id,
            records = total,
            "Loaded punish history"
        );
        Ok(())
    }

    /// Records a yellow card for a missed slot, escalating to red at the threshold.
    pub fn apply_yellow(
        &self,
        state: &mut ChainState,
        agent_hash: TxHash,
        height: u64,
        round_index: u64,
        time: u64,
    ) -> Result<CardOutcome, ChainError> {
        let card = PunishRecord {
            agent_hash,
            color: CardColor::Yellow,
            height,
            reason: PunishReason::MissedSlot,
            round_index,
            time,
        };
        let outcome = self.record(state, card)?;
        if outcome == CardOutcome::Escalated {
            tracing::warn!(
                target: "consensus",
                chain_id = state.chain_id,
                agent = %agent_hash,
                round = round_index,
                "Yellow card threshold reached"
            );
            self.apply_red(
                state,
                agent_hash,
                PunishReason::YellowAccumulation,
                height,
                round_index,
                time,
            )?;
        }
        Ok(outcome)
    }

    /// Records a red card, releases every deposit bound to the agent and exits it.
    ///
    /// Re-applying the same card is a no-op, as is exiting an agent that is no
    /// longer live.
    pub fn apply_red(
        &self,
        state: &mut ChainState,
        agent_hash: TxHash,
        reason: PunishReason,
        height: u64,
        round_index: u64,
        time: u64,
    ) -> Result<CardOutcome, ChainError> {
        let card = PunishRecord {
            agent_hash,
            color: CardColor::Red,
            height,
            reason,
            round_index,
            time,
        };
        let outcome = self.record(state, card)?;
        if outcome != CardOutcome::Duplicate && state.live_agent(&agent_hash).is_some() {
            let released = self
                .deposits
                .release_agent_deposits(state, &agent_hash, height)?;
            self.agents.disqualify(state, &agent_hash, time)?;
            tracing::debug!(
                target: "consensus",
                chain_id = state.chain_id,
                agent = %agent_hash,
                released,
                "Deposits released by red card"
            );
        }
        Ok(outcome)
    }

    /// Applies a red punish transaction carrying double-sign or equivocation evidence.
    pub fn apply_red_tx(
        &self,
        state: &mut ChainState,
        tx: &RedPunishTx,
    ) -> Result<CardOutcome, ChainError> {
        if !matches!(
            tx.reason,
            PunishReason::DoubleSign | PunishReason::Equivocation
        ) {
            return Err(ValidationError::InvalidRedReason.into());
        }
        if !self.agents.is_known(state, &tx.agent_hash)? {
            return Err(ValidationError::UnknownPunishTarget(tx.agent_hash).into());
        }
        self.apply_red(
            state,
            tx.agent_hash,
            tx.reason,
            tx.height,
            tx.round_index,
            tx.time,
        )
    }

    fn record(&self, state: &mut ChainState, card: PunishRecord) -> Result<CardOutcome, ChainError> {
        let outcome = compute_card_outcome(
            state.punish_history(&card.agent_hash),
            &card,
            state.config.yellow_card_threshold,
            state.config.punish_window_rounds,
        );
        if outcome == CardOutcome::Duplicate {
            tracing::debug!(
                target: "consensus",
                chain_id = state.chain_id,
                agent = %card.agent_hash,
                height = card.height,
                "Ignoring replayed punishment"
            );
            return Ok(outcome);
        }

        self.store.put(
            &punish_table(state.chain_id),
            &card.storage_key(),
            &codec::to_bytes_canonical(&card),
        )?;
        consensus_metrics().inc_cards_issued(state.chain_id, card.color.as_str());
        tracing::info!(
            target: "consensus",
            chain_id = state.chain_id,
            agent = %card.agent_hash,
            color = card.color.as_str(),
            reason = ?card.reason,
            height = card.height,
            round = card.round_index,
            "Card issued"
        );
        state.punishes.entry(card.agent_hash).or_default().push(card);
        Ok(outcome)
    }
}
