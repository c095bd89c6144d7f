// Path: crates/consensus/src/agent.rs

//! Agent registry and credit.

use crate::punish::{has_red_card, yellow_count_in_window};
use crate::state::ChainState;
use poc_api::ledger::LedgerService;
use poc_api::storage::TableStore;
use poc_types::app::{
    Agent, AgentStatus, Amount, Deposit, PunishRecord, RegisterAgentTx, StopAgentTx, TxHash,
};
use poc_types::codec;
use poc_types::config::ChainConfig;
use poc_types::error::{ChainError, StorageError, ValidationError};
use poc_types::keys::agent_table;
use std::sync::Arc;

/// The agent's own deposit plus every active deposit bound to it.
pub fn effective_stake(agent: &Agent, deposits: &[Deposit]) -> Amount {
    deposits
        .iter()
        .filter(|d| d.is_active() && d.agent_hash == agent.agent_hash)
        .fold(agent.deposit, |acc, d| acc.saturating_add(d.amount))
}

/// Computes an agent's credit for `current_round`.
///
/// `stake × (threshold − yellows) / threshold`, where `yellows` counts the
/// yellow cards inside the punish window, capped at the threshold. Any red card
/// zeroes the credit. Pure: identical inputs give identical credit on every node.
pub fn compute_credit(
    agent: &Agent,
    deposits: &[Deposit],
    history: &[PunishRecord],
    current_round: u64,
    config: &ChainConfig,
) -> Amount {
    if has_red_card(history) {
        return 0;
    }
    let threshold = config.yellow_card_threshold.max(1);
    let yellows =
        yellow_count_in_window(history, current_round, config.punish_window_rounds).min(threshold);
    effective_stake(agent, deposits)
        .saturating_mul(Amount::from(threshold - yellows))
        .checked_div(Amount::from(threshold))
        .unwrap_or(0)
}

/// Loads, registers, stops and disqualifies the agents of a chain.
pub struct AgentManager {
    store: Arc<dyn TableStore>,
    ledger: Arc<dyn LedgerService>,
}

impl AgentManager {
    pub fn new(store: Arc<dyn TableStore>, ledger: Arc<dyn LedgerService>) -> Self {
        Self { store, ledger }
    }

    /// Scans the agent table into the cache.
    ///
    /// Active agents populate the schedulable set and stopped agents still inside
    /// their lock go to `pending_exits`. Red-carded agents only leave their
    /// address lock behind. A scan failure leaves all three empty and the chain
    /// starts degraded; an undecodable record is skipped.
    pub fn load_agents(&self, state: &mut ChainState) {
        state.agents.clear();
        state.pending_exits.clear();
        state.locks.clear();

        let table = agent_table(state.chain_id);
        let entries = match self.store.scan(&table) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    target: "consensus",
                    chain_id = state.chain_id,
                    error = %e,
                    "Agent scan failed; starting with an empty agent cache"
                );
                return;
            }
        };

        for (key, value) in entries {
            let agent: Agent = match codec::from_bytes_canonical(&value) {
                Ok(agent) => agent,
                Err(e) => {
                    tracing::error!(
                        target: "consensus",
                        chain_id = state.chain_id,
                        key = %hex::encode(&key),
                        error = %e,
                        "Skipping undecodable agent record"
                    );
                    continue;
                }
            };
            match agent.status {
                AgentStatus::Active => state.agents.push(agent),
                AgentStatus::Exiting => state.pending_exits.push(agent),
                AgentStatus::Exited => {
                    if let Some(until) = agent.locked_until {
                        state.locks.insert(agent.agent_address, until);
                    }
                }
            }
        }

        tracing::info!(
            target: "consensus",
            chain_id = state.chain_id,
            active = state.agents.len(),
            exiting = state.pending_exits.len(),
            "Loaded agents"
        );
    }

    /// Recomputes every active agent's credit for `round_index`.
    pub fn refresh_credits(&self, state: &mut ChainState, round_index: u64) {
        let credits: Vec<Amount> = state
            .agents
            .iter()
            .map(|a| {
                compute_credit(
                    a,
                    &state.deposits,
                    state.punish_history(&a.agent_hash),
                    round_index,
                    &state.config,
                )
            })
            .collect();
        for (agent, credit) in state.agents.iter_mut().zip(credits) {
            agent.credit = credit;
        }
    }

    /// Validates and applies a registration transaction.
    pub async fn register(
        &self,
        state: &mut ChainState,
        tx: &RegisterAgentTx,
    ) -> Result<Agent, ChainError> {
        let table = agent_table(state.chain_id);
        if state.live_agent(&tx.tx_hash).is_some() || self.store.get(&table, &tx.tx_hash.0)?.is_some()
        {
            return Err(ValidationError::DuplicateTransaction(tx.tx_hash).into());
        }

        let config = &state.config;
        if tx.commission_rate < config.commission_rate_min
            || tx.commission_rate > config.commission_rate_max
        {
            return Err(ValidationError::CommissionRateOutOfRange {
                rate: tx.commission_rate,
                min: config.commission_rate_min,
                max: config.commission_rate_max,
            }
            .into());
        }
        if tx.deposit < config.commission_min || tx.deposit > config.commission_max {
            return Err(ValidationError::CommissionOutOfRange {
                amount: tx.deposit,
                min: config.commission_min,
                max: config.commission_max,
            }
            .into());
        }

        let address_taken = state
            .agents
            .iter()
            .chain(state.pending_exits.iter())
            .any(|a| {
                a.agent_address == tx.agent_address
                    || a.packing_address == tx.packing_address
                    || a.packing_address == tx.agent_address
            });
        if address_taken {
            return Err(ValidationError::AddressInUse.into());
        }
        if let Some(until) = state.locked_until(&tx.agent_address, tx.time) {
            return Err(ValidationError::AddressLocked { until }.into());
        }

        let required = tx.deposit.saturating_add(tx.fee);
        let available = self
            .ledger
            .available_balance(state.chain_id, config.assets_id, &tx.agent_address)
            .await?;
        if available < required {
            return Err(ValidationError::InsufficientBalance {
                required,
                available,
            }
            .into());
        }

        let agent = Agent {
            agent_hash: tx.tx_hash,
            agent_address: tx.agent_address,
            packing_address: tx.packing_address,
            reward_address: tx.reward_address,
            commission_rate: tx.commission_rate,
            deposit: tx.deposit,
            create_height: tx.height,
            create_time: tx.time,
            status: AgentStatus::Active,
            credit: 0,
            stop_time: None,
            locked_until: None,
        };
        self.persist(state.chain_id, &agent)?;
        state.agents.push(agent.clone());

        tracing::info!(
            target: "consensus",
            chain_id = state.chain_id,
            agent = %agent.agent_hash,
            address = %agent.agent_address,
            deposit = %agent.deposit,
            "Registered agent"
        );
        Ok(agent)
    }

    /// Checks that `tx` may stop its agent. Nothing is mutated.
    pub async fn validate_stop(
        &self,
        state: &ChainState,
        tx: &StopAgentTx,
    ) -> Result<(), ChainError> {
        let agent = match state.agent(&tx.agent_hash) {
            Some(agent) => agent,
            None if state.live_agent(&tx.agent_hash).is_some() => {
                return Err(ValidationError::AgentNotActive(tx.agent_hash).into())
            }
            None => return Err(ValidationError::AgentNotFound(tx.agent_hash).into()),
        };
        if agent.agent_address != tx.sender {
            return Err(ValidationError::NotOwner.into());
        }
        let available = self
            .ledger
            .available_balance(state.chain_id, state.config.assets_id, &tx.sender)
            .await?;
        if available < tx.fee {
            return Err(ValidationError::InsufficientBalance {
                required: tx.fee,
                available,
            }
            .into());
        }
        Ok(())
    }

    /// Moves a validated agent to `Exiting`. Its deposits must already be released.
    pub fn stop(&self, state: &mut ChainState, tx: &StopAgentTx) -> Result<(), ChainError> {
        let pos = state
            .agents
            .iter()
            .position(|a| a.agent_hash == tx.agent_hash)
            .ok_or(ValidationError::AgentNotFound(tx.agent_hash))?;

        let mut stopped = state.agents.get(pos).cloned().ok_or(ValidationError::AgentNotFound(tx.agent_hash))?;
        stopped.status = AgentStatus::Exiting;
        stopped.stop_time = Some(tx.time);
        stopped.credit = 0;
        self.persist(state.chain_id, &stopped)?;

        state.agents.remove(pos);
        state.pending_exits.push(stopped);
        tracing::info!(
            target: "consensus",
            chain_id = state.chain_id,
            agent = %tx.agent_hash,
            "Agent stopping"
        );
        Ok(())
    }

    /// Moves stopped agents whose stop lock has elapsed to `Exited`.
    ///
    /// A failed write keeps the agent pending so the next tick retries it.
    pub fn finalize_exits(&self, state: &mut ChainState, now: u64) -> usize {
        let lock = state.config.stop_lock_millis();
        let mut finalized = 0;
        let mut still_pending = Vec::with_capacity(state.pending_exits.len());

        for mut agent in std::mem::take(&mut state.pending_exits) {
            let due = agent.stop_time.unwrap_or(0).saturating_add(lock) <= now;
            if !due {
                still_pending.push(agent);
                continue;
            }
            agent.status = AgentStatus::Exited;
            match self.persist(state.chain_id, &agent) {
                Ok(()) => {
                    finalized += 1;
                    tracing::info!(
                        target: "consensus",
                        chain_id = state.chain_id,
                        agent = %agent.agent_hash,
                        "Agent exited after stop lock"
                    );
                }
                Err(e) => {
                    agent.status = AgentStatus::Exiting;
                    tracing::warn!(
                        target: "consensus",
                        chain_id = state.chain_id,
                        agent = %agent.agent_hash,
                        error = %e,
                        "Failed to finalize agent exit"
                    );
                    still_pending.push(agent);
                }
            }
        }
        state.pending_exits = still_pending;
        finalized
    }

    /// Exits an agent after a red card. Its owning address cannot register a new
    /// agent until `time + red lock`. The caller releases the agent's deposits.
    ///
    /// Returns `false` if the agent was not live.
    pub fn disqualify(
        &self,
        state: &mut ChainState,
        agent_hash: &TxHash,
        time: u64,
    ) -> Result<bool, StorageError> {
        let Some(mut agent) = state.live_agent(agent_hash).cloned() else {
            return Ok(false);
        };
        agent.status = AgentStatus::Exited;
        agent.credit = 0;
        agent.stop_time = Some(agent.stop_time.unwrap_or(time));
        agent.locked_until = Some(time.saturating_add(state.config.red_lock_millis()));
        self.persist(state.chain_id, &agent)?;

        state.agents.retain(|a| &a.agent_hash != agent_hash);
        state.pending_exits.retain(|a| &a.agent_hash != agent_hash);
        if let Some(until) = agent.locked_until {
            state.locks.insert(agent.agent_address, until);
        }
        tracing::warn!(
            target: "consensus",
            chain_id = state.chain_id,
            agent = %agent_hash,
            locked_until = ?agent.locked_until,
            "Agent disqualified"
        );
        Ok(true)
    }

    /// Returns true if the agent table holds a record for `agent_hash`.
    pub fn is_known(&self, state: &ChainState, agent_hash: &TxHash) -> Result<bool, StorageError> {
        if state.live_agent(agent_hash).is_some() {
            return Ok(true);
        }
        Ok(self
            .store
            .get(&agent_table(state.chain_id), &agent_hash.0)?
            .is_some())
    }

    fn persist(&self, chain_id: u32, agent: &Agent) -> Result<(), StorageError> {
        self.store.put(
            &agent_table(chain_id),
            &agent.agent_hash.0,
            &codec::to_bytes_canonical(agent),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poc_storage::MemoryTableStore;
    use poc_test_utils::fixtures::{agent, deposit, register_tx, test_chain_config, yellow};
    use poc_test_utils::MockLedger;
    use poc_types::app::Address;

    fn setup() -> (Arc<MemoryTableStore>, Arc<MockLedger>, AgentManager, ChainState) {
        let store = Arc::new(MemoryTableStore::new());
        let ledger = Arc::new(MockLedger::new());
        let config = Arc::new(test_chain_config(1));
        store.create_table(&agent_table(1)).unwrap();
        let manager = AgentManager::new(store.clone(), ledger.clone());
        (store, ledger, manager, ChainState::new(config, 16))
    }

    #[test]
    fn credit_decays_with_yellow_cards_and_vanishes_on_red() {
        let config = test_chain_config(1);
        let a = agent(1, 1, 900);
        let deposits = vec![deposit(10, &a, 300)];
        assert_eq!(compute_credit(&a, &deposits, &[], 5, &config), 1_200);

        let one_yellow = vec![yellow(&a, 10, 4)];
        assert_eq!(compute_credit(&a, &deposits, &one_yellow, 5, &config), 800);

        // Outside the window the card no longer counts.
        let far = config.punish_window_rounds + 10;
        assert_eq!(compute_credit(&a, &deposits, &one_yellow, far, &config), 1_200);

        let mut red = yellow(&a, 11, 5);
        red.color = poc_types::app::CardColor::Red;
        assert_eq!(compute_credit(&a, &deposits, &[red], 5, &config), 0);
    }

    #[test]
    fn load_agents_splits_active_and_exiting() {
        let (store, _ledger, manager, mut state) = setup();
        let active = agent(1, 1, 500);
        let mut exiting = agent(2, 2, 500);
        exiting.status = AgentStatus::Exiting;
        let mut exited = agent(3, 3, 500);
        exited.status = AgentStatus::Exited;
        for a in [&active, &exiting, &exited] {
            store
                .put(&agent_table(1), &a.agent_hash.0, &codec::to_bytes_canonical(a))
                .unwrap();
        }
        store.put(&agent_table(1), &[0xff; 32], b"garbage").unwrap();

        manager.load_agents(&mut state);
        assert_eq!(state.agents, vec![active]);
        assert_eq!(state.pending_exits, vec![exiting]);
    }

    #[test]
    fn load_agents_degrades_on_missing_table() {
        let store = Arc::new(MemoryTableStore::new());
        let manager = AgentManager::new(store, Arc::new(MockLedger::new()));
        let mut state = ChainState::new(Arc::new(test_chain_config(1)), 16);
        state.agents.push(agent(1, 1, 500));
        manager.load_agents(&mut state);
        assert!(state.agents.is_empty());
    }

    #[tokio::test]
    async fn register_validates_before_writing() {
        let (store, ledger, manager, mut state) = setup();
        let tx = register_tx(1, 1, 500);
        ledger.set_balance(tx.agent_address, 400);

        let err = manager.register(&mut state, &tx).await.unwrap_err();
        assert!(matches!(
            err,
            ChainError::Validation(ValidationError::InsufficientBalance { .. })
        ));
        assert!(state.agents.is_empty());
        assert!(store.scan(&agent_table(1)).unwrap().is_empty());

        ledger.set_balance(tx.agent_address, 10_000);
        manager.register(&mut state, &tx).await.unwrap();
        assert_eq!(state.agents.len(), 1);

        let err = manager.register(&mut state, &tx).await.unwrap_err();
        assert!(matches!(
            err,
            ChainError::Validation(ValidationError::DuplicateTransaction(_))
        ));

        let mut same_owner = register_tx(2, 1, 500);
        same_owner.packing_address = Address([0xee; 32]);
        let err = manager.register(&mut state, &same_owner).await.unwrap_err();
        assert!(matches!(err, ChainError::Validation(ValidationError::AddressInUse)));
    }

    #[tokio::test]
    async fn register_enforces_commission_bounds() {
        let (_store, ledger, manager, mut state) = setup();
        let mut tx = register_tx(1, 1, 5);
        ledger.set_balance(tx.agent_address, 10_000);
        let err = manager.register(&mut state, &tx).await.unwrap_err();
        assert!(matches!(
            err,
            ChainError::Validation(ValidationError::CommissionOutOfRange { .. })
        ));

        tx.deposit = 500;
        tx.commission_rate = 101;
        let err = manager.register(&mut state, &tx).await.unwrap_err();
        assert!(matches!(
            err,
            ChainError::Validation(ValidationError::CommissionRateOutOfRange { .. })
        ));
    }

    #[tokio::test]
    async fn stop_then_finalize_after_lock() {
        let (store, ledger, manager, mut state) = setup();
        let a = agent(1, 1, 500);
        state.agents.push(a.clone());
        ledger.set_balance(a.agent_address, 100);

        let stop = StopAgentTx {
            tx_hash: TxHash([0x51; 32]),
            agent_hash: a.agent_hash,
            sender: Address([0x99; 32]),
            fee: 1,
            height: 10,
            time: 1_000,
        };
        let err = manager.validate_stop(&state, &stop).await.unwrap_err();
        assert!(matches!(err, ChainError::Validation(ValidationError::NotOwner)));

        let stop = StopAgentTx {
            sender: a.agent_address,
            ..stop
        };
        manager.validate_stop(&state, &stop).await.unwrap();
        manager.stop(&mut state, &stop).unwrap();
        assert!(state.agents.is_empty());
        assert_eq!(state.pending_exits.len(), 1);

        let lock = state.config.stop_lock_millis();
        assert_eq!(manager.finalize_exits(&mut state, 1_000 + lock - 1), 0);
        assert_eq!(manager.finalize_exits(&mut state, 1_000 + lock), 1);
        assert!(state.pending_exits.is_empty());

        let stored: Agent = codec::from_bytes_canonical(
            &store.get(&agent_table(1), &a.agent_hash.0).unwrap().unwrap(),
        )
        .unwrap();
        assert_eq!(stored.status, AgentStatus::Exited);
    }

    #[test]
    fn disqualify_sets_red_lock() {
        let (_store, _ledger, manager, mut state) = setup();
        let a = agent(1, 1, 500);
        state.agents.push(a.clone());
        assert!(manager.disqualify(&mut state, &a.agent_hash, 2_000).unwrap());
        assert!(state.agents.is_empty());
        assert!(manager.is_known(&state, &a.agent_hash).unwrap());
        assert!(!manager.disqualify(&mut state, &a.agent_hash, 3_000).unwrap());
    }

    #[tokio::test]
    async fn red_lock_blocks_reregistration_until_it_ends() {
        let (store, ledger, manager, mut state) = setup();
        let first = register_tx(1, 1, 500);
        ledger.set_balance(first.agent_address, 10_000);
        manager.register(&mut state, &first).await.unwrap();
        manager.disqualify(&mut state, &first.tx_hash, 2_000).unwrap();
        let until = 2_000 + state.config.red_lock_millis();

        let mut again = register_tx(2, 1, 500);
        again.time = until - 1;
        let err = manager.register(&mut state, &again).await.unwrap_err();
        assert!(matches!(
            err,
            ChainError::Validation(ValidationError::AddressLocked { until: u }) if u == until
        ));

        // The lock survives a reload from storage.
        manager.load_agents(&mut state);
        assert_eq!(state.locked_until(&first.agent_address, until - 1), Some(until));

        again.time = until;
        manager.register(&mut state, &again).await.unwrap();
        assert_eq!(store.scan(&agent_table(1)).unwrap().len(), 2);
    }
}
