// Path: crates/consensus/src/deposit.rs

//! The stake ledger backing agent credit.

use crate::state::ChainState;
use poc_api::ledger::LedgerService;
use poc_api::storage::{Entry, TableStore};
use poc_types::app::{Deposit, DepositStatus, DepositTx, TxHash, WithdrawTx};
use poc_types::codec;
use poc_types::error::{ChainError, StorageError, ValidationError};
use poc_types::keys::deposit_table;
use std::sync::Arc;

pub struct DepositManager {
    store: Arc<dyn TableStore>,
    ledger: Arc<dyn LedgerService>,
}

impl DepositManager {
    pub fn new(store: Arc<dyn TableStore>, ledger: Arc<dyn LedgerService>) -> Self {
        Self { store, ledger }
    }

    /// Scans the deposit table into the cache. Must run after the agents are loaded.
    ///
    /// Only active deposits whose agent is in the active cache are kept. A deposit
    /// pointing at an unknown agent is an orphan and is skipped with a warning.
    pub fn load_deposits(&self, state: &mut ChainState) {
        state.deposits.clear();
        let table = deposit_table(state.chain_id);
        let entries = match self.store.scan(&table) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    target: "consensus",
                    chain_id = state.chain_id,
                    error = %e,
                    "Deposit scan failed; starting with an empty deposit cache"
                );
                return;
            }
        };

        let mut orphans = 0usize;
        for (key, value) in entries {
            let deposit: Deposit = match codec::from_bytes_canonical(&value) {
                Ok(d) => d,
                Err(e) => {
                    tracing::error!(
                        target: "consensus",
                        chain_id = state.chain_id,
                        key = %hex::encode(&key),
                        error = %e,
                        "Skipping undecodable deposit record"
                    );
                    continue;
                }
            };
            if !deposit.is_active() {
                continue;
            }
            if state.agent(&deposit.agent_hash).is_none() {
                orphans += 1;
                tracing::warn!(
                    target: "consensus",
                    chain_id = state.chain_id,
                    deposit = %deposit.tx_hash,
                    agent = %deposit.agent_hash,
                    "Skipping orphaned deposit"
                );
                continue;
            }
            state.deposits.push(deposit);
        }

        tracing::info!(
            target: "consensus",
            chain_id = state.chain_id,
            deposits = state.deposits.len(),
            orphans,
            "Loaded deposits"
        );
    }

    /// Validates and applies a deposit transaction. A rejection leaves state untouched.
    pub async fn apply_deposit(
        &self,
        state: &mut ChainState,
        tx: &DepositTx,
    ) -> Result<Deposit, ChainError> {
        let table = deposit_table(state.chain_id);
        if state.deposit(&tx.tx_hash).is_some() || self.store.get(&table, &tx.tx_hash.0)?.is_some() {
            return Err(ValidationError::DuplicateTransaction(tx.tx_hash).into());
        }

        let agent = match state.agent(&tx.agent_hash) {
            Some(agent) => agent,
            None if state.live_agent(&tx.agent_hash).is_some() => {
                return Err(ValidationError::AgentNotActive(tx.agent_hash).into())
            }
            None => return Err(ValidationError::AgentNotFound(tx.agent_hash).into()),
        };

        let config = &state.config;
        if tx.amount < config.deposit_min || tx.amount > config.deposit_max {
            return Err(ValidationError::DepositOutOfRange {
                amount: tx.amount,
                min: config.deposit_min,
                max: config.deposit_max,
            }
            .into());
        }
        if tx.depositor != agent.agent_address && tx.amount < config.entruster_deposit_min {
            return Err(ValidationError::EntrusterDepositTooLow {
                amount: tx.amount,
                min: config.entruster_deposit_min,
            }
            .into());
        }

        let required = tx.amount.saturating_add(tx.fee);
        let available = self
            .ledger
            .available_balance(state.chain_id, config.assets_id, &tx.depositor)
            .await?;
        if available < required {
            return Err(ValidationError::InsufficientBalance {
                required,
                available,
            }
            .into());
        }

        let deposit = Deposit {
            tx_hash: tx.tx_hash,
            agent_hash: tx.agent_hash,
            depositor: tx.depositor,
            amount: tx.amount,
            height: tx.height,
            time: tx.time,
            status: DepositStatus::Active,
            withdraw_height: None,
        };
        self.store
            .put(&table, &deposit.tx_hash.0, &codec::to_bytes_canonical(&deposit))?;
        state.deposits.push(deposit.clone());

        tracing::info!(
            target: "consensus",
            chain_id = state.chain_id,
            deposit = %deposit.tx_hash,
            agent = %deposit.agent_hash,
            amount = %deposit.amount,
            "Deposit accepted"
        );
        Ok(deposit)
    }

    /// Validates and applies a withdrawal of one deposit by its depositor.
    ///
    /// A deposit still active in storage but bound to an agent that left the
    /// active set is not cached; it stays withdrawable.
    pub async fn withdraw(
        &self,
        state: &mut ChainState,
        tx: &WithdrawTx,
    ) -> Result<Deposit, ChainError> {
        let table = deposit_table(state.chain_id);
        let deposit = match state.deposit(&tx.deposit_hash) {
            Some(d) => d.clone(),
            None => {
                let stored = self
                    .store
                    .get(&table, &tx.deposit_hash.0)?
                    .map(|bytes| codec::from_bytes_canonical::<Deposit>(&bytes))
                    .transpose()
                    .map_err(StorageError::Decode)?;
                match stored {
                    Some(d) if !d.is_active() => {
                        return Err(ValidationError::DepositAlreadyWithdrawn(tx.deposit_hash).into())
                    }
                    Some(d) if state.agent(&d.agent_hash).is_none() => d,
                    _ => return Err(ValidationError::DepositNotFound(tx.deposit_hash).into()),
                }
            }
        };
        if deposit.depositor != tx.sender {
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

        let withdrawn = Deposit {
            status: DepositStatus::Withdrawn,
            withdraw_height: Some(tx.height),
            ..deposit
        };
        self.store
            .put(&table, &withdrawn.tx_hash.0, &codec::to_bytes_canonical(&withdrawn))?;
        state.deposits.retain(|d| d.tx_hash != tx.deposit_hash);

        tracing::info!(
            target: "consensus",
            chain_id = state.chain_id,
            deposit = %withdrawn.tx_hash,
            "Deposit withdrawn"
        );
        Ok(withdrawn)
    }

    /// Releases every active deposit of a stopping agent in one batch.
    pub fn release_agent_deposits(
        &self,
        state: &mut ChainState,
        agent_hash: &TxHash,
        height: u64,
    ) -> Result<usize, StorageError> {
        let batch: Vec<Entry> = state
            .deposits
            .iter()
            .filter(|d| &d.agent_hash == agent_hash)
            .map(|d| {
                let released = Deposit {
                    status: DepositStatus::Withdrawn,
                    withdraw_height: Some(height),
                    ..d.clone()
                };
                (released.tx_hash.0.to_vec(), codec::to_bytes_canonical(&released))
            })
            .collect();
        if batch.is_empty() {
            return Ok(0);
        }
        self.store.put_batch(&deposit_table(state.chain_id), &batch)?;
        state.deposits.retain(|d| &d.agent_hash != agent_hash);
        Ok(batch.len())
    }
}
