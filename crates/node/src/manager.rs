// Path: crates/node/src/manager.rs

//! The chain registry and lifecycle.

use crate::chain::{Chain, ChainStatus};
use crate::scheduler::{drive_chain_tick, SchedulerManager, TickContext};
use dashmap::DashMap;
use poc_api::chain::BlockHeaderService;
use poc_api::ledger::LedgerService;
use poc_api::protocol::ProtocolRegistry;
use poc_api::storage::{ensure_table, TableStore};
use poc_api::time::Clock;
use poc_consensus::{AgentManager, DepositManager, PunishManager, RoundManager, TickReport};
use poc_telemetry::chain_metrics;
use poc_types::app::{
    Agent, ChainId, ConsensusTx, Deposit, Round, RoundMember, TxHash, CONSENSUS_TX_TYPES,
};
use poc_types::codec;
use poc_types::config::{ChainConfig, ConsensusConfig};
use poc_types::error::{ChainError, ConsensusError, ErrorCode, ValidationError};
use poc_types::keys::{chain_config_key, chain_tables, CONFIG_TABLE};
use std::sync::Arc;
use tracing::Instrument;

/// The external collaborators of the node.
#[derive(Clone)]
pub struct NodeServices {
    pub store: Arc<dyn TableStore>,
    pub headers: Arc<dyn BlockHeaderService>,
    pub ledger: Arc<dyn LedgerService>,
    pub protocol: Arc<dyn ProtocolRegistry>,
    pub clock: Arc<dyn Clock>,
}

/// The consensus managers, constructed once and shared by every chain.
#[derive(Clone)]
pub struct ConsensusManagers {
    pub agents: Arc<AgentManager>,
    pub deposits: Arc<DepositManager>,
    pub punishes: Arc<PunishManager>,
    pub rounds: Arc<RoundManager>,
}

impl ConsensusManagers {
    pub fn new(store: Arc<dyn TableStore>, ledger: Arc<dyn LedgerService>) -> Self {
        let agents = Arc::new(AgentManager::new(store.clone(), ledger.clone()));
        let deposits = Arc::new(DepositManager::new(store.clone(), ledger));
        let punishes = Arc::new(PunishManager::new(store, agents.clone(), deposits.clone()));
        let rounds = Arc::new(RoundManager::new(agents.clone(), punishes.clone()));
        Self {
            agents,
            deposits,
            punishes,
            rounds,
        }
    }
}

/// Owns the registry of hosted chains and drives their lifecycle.
pub struct ChainManager {
    chains: DashMap<ChainId, Arc<Chain>>,
    services: NodeServices,
    managers: ConsensusManagers,
    scheduler: SchedulerManager,
    defaults: ConsensusConfig,
    header_tail_len: usize,
}

fn lifecycle_error(chain: &Chain, operation: &'static str) -> ChainError {
    ChainError::InvalidLifecycle {
        chain_id: chain.chain_id(),
        status: chain.status().to_string(),
        operation,
    }
}

impl ChainManager {
    pub fn new(services: NodeServices, defaults: ConsensusConfig, header_tail_len: usize) -> Self {
        let managers = ConsensusManagers::new(services.store.clone(), services.ledger.clone());
        Self::with_managers(services, managers, defaults, header_tail_len)
    }

    pub fn with_managers(
        services: NodeServices,
        managers: ConsensusManagers,
        defaults: ConsensusConfig,
        header_tail_len: usize,
    ) -> Self {
        let scheduler = SchedulerManager::new(TickContext {
            headers: services.headers.clone(),
            rounds: managers.rounds.clone(),
            clock: services.clock.clone(),
        });
        Self {
            chains: DashMap::new(),
            services,
            managers,
            scheduler,
            defaults,
            header_tail_len,
        }
    }

    /// Boots the node: initializes every configured chain, binds transaction
    /// types and runs every chain. Returns the ids of the running chains.
    pub async fn start(&self) -> Result<Vec<ChainId>, ChainError> {
        self.init_chain()?;
        self.register_tx()?;
        Ok(self.run_all().await)
    }

    /// Loads every persisted chain configuration and opens its tables.
    ///
    /// On a fresh node a configuration is synthesized from the process defaults
    /// and persisted. A configuration that does not decode or validate keeps that
    /// chain out of the registry; the others still initialize.
    pub fn init_chain(&self) -> Result<Vec<ChainId>, ChainError> {
        let store = &self.services.store;
        ensure_table(store.as_ref(), CONFIG_TABLE)?;

        let entries = store.scan(CONFIG_TABLE)?;
        let mut configs = Vec::with_capacity(entries.len());
        for (key, value) in &entries {
            match codec::from_bytes_canonical::<ChainConfig>(value) {
                Ok(config) => configs.push(config),
                Err(e) => tracing::error!(
                    target: "chain",
                    key = ?key,
                    error = %e,
                    "Skipping undecodable chain configuration"
                ),
            }
        }

        if entries.is_empty() {
            let config = ChainConfig::from_defaults(&self.defaults);
            config.validate()?;
            store.put(
                CONFIG_TABLE,
                &chain_config_key(config.chain_id),
                &codec::to_bytes_canonical(&config),
            )?;
            tracing::info!(
                target: "chain",
                chain_id = config.chain_id,
                block_reward = %config.block_reward,
                "No chain configured; synthesized one from defaults"
            );
            configs.push(config);
        }

        let mut initialized = Vec::with_capacity(configs.len());
        for config in configs {
            let chain_id = config.chain_id;
            match self.init_config(config) {
                Ok(true) => initialized.push(chain_id),
                Ok(false) => {}
                Err(e) => tracing::error!(
                    target: "chain",
                    chain_id,
                    code = e.code(),
                    error = %e,
                    "Chain initialization failed"
                ),
            }
        }
        Ok(initialized)
    }

    /// Validates `config`, opens the chain's tables and registers the chain.
    ///
    /// Returns `false` if the chain is already registered.
    fn init_config(&self, config: ChainConfig) -> Result<bool, ChainError> {
        config.validate()?;
        let chain_id = config.chain_id;
        if self.chains.contains_key(&chain_id) {
            return Ok(false);
        }

        for table in chain_tables(chain_id) {
            if !ensure_table(self.services.store.as_ref(), &table)? {
                tracing::info!(target: "chain", chain_id, table = %table, "Table already exists");
            }
        }

        let chain = Arc::new(Chain::new(config, self.header_tail_len));
        chain.set_status(ChainStatus::Initialized);
        self.chains.insert(chain_id, chain);
        tracing::info!(target: "chain", chain_id, "Chain initialized");
        Ok(true)
    }

    /// Registers and initializes a new chain at runtime.
    pub fn add_chain(&self, config: ChainConfig) -> Result<(), ChainError> {
        config.validate()?;
        if let Some(existing) = self.chain(config.chain_id) {
            return Err(lifecycle_error(&existing, "add"));
        }
        ensure_table(self.services.store.as_ref(), CONFIG_TABLE)?;
        self.services.store.put(
            CONFIG_TABLE,
            &chain_config_key(config.chain_id),
            &codec::to_bytes_canonical(&config),
        )?;
        let chain_id = config.chain_id;
        self.init_config(config)?;
        self.register_chain_tx(chain_id)
    }

    /// Binds the consensus transaction types of every chain for its active protocol version.
    pub fn register_tx(&self) -> Result<(), ChainError> {
        for chain_id in self.chain_ids() {
            self.register_chain_tx(chain_id)?;
        }
        Ok(())
    }

    fn register_chain_tx(&self, chain_id: ChainId) -> Result<(), ChainError> {
        let protocol = &self.services.protocol;
        let version = protocol.current_protocol_version(chain_id)?;
        protocol.register_tx_types(chain_id, version, &CONSENSUS_TX_TYPES)?;
        tracing::info!(
            target: "chain",
            chain_id,
            version,
            types = CONSENSUS_TX_TYPES.len(),
            "Registered consensus transaction types"
        );
        Ok(())
    }

    /// Runs every initialized or stopped chain. Failures are logged per chain.
    pub async fn run_all(&self) -> Vec<ChainId> {
        let mut running = Vec::new();
        for chain_id in self.chain_ids() {
            match self.run_chain(chain_id).await {
                Ok(()) => running.push(chain_id),
                Err(e) => tracing::error!(
                    target: "chain",
                    chain_id,
                    code = e.code(),
                    error = %e,
                    "Chain failed to start"
                ),
            }
        }
        running
    }

    /// Loads the chain's caches, computes its initial round if it has history,
    /// and starts its scheduler.
    ///
    /// The status is checked again under the chain's lock, so a run queued behind
    /// a concurrent stop, delete or run observes its outcome.
    pub async fn run_chain(&self, chain_id: ChainId) -> Result<(), ChainError> {
        let chain = self.require(chain_id)?;
        if !matches!(chain.status(), ChainStatus::Initialized | ChainStatus::Stopped) {
            return Err(lifecycle_error(&chain, "run"));
        }
        let span = chain.loggers().basic.clone();
        self.load_and_start(chain).instrument(span).await
    }

    async fn load_and_start(&self, chain: Arc<Chain>) -> Result<(), ChainError> {
        let chain_id = chain.chain_id();
        {
            let mut state = chain.state().lock().await;
            if !matches!(chain.status(), ChainStatus::Initialized | ChainStatus::Stopped) {
                return Err(lifecycle_error(&chain, "run"));
            }
            state.clear_caches();
            state.round = None;
            state.last_advance = None;
            state.clear_headers();

            match self
                .services
                .headers
                .load_headers(chain_id, self.header_tail_len)
                .await
            {
                Ok(headers) => {
                    state.push_headers(headers);
                }
                Err(e) => tracing::warn!(
                    target: "chain",
                    chain_id,
                    error = %e,
                    "Header load failed; starting without history"
                ),
            }

            self.managers.agents.load_agents(&mut state);
            self.managers.deposits.load_deposits(&mut state);
            if let Err(e) = self.managers.punishes.load_punishes(&mut state) {
                return Err(self.fail(&chain, e));
            }

            if state.headers.len() > 1 {
                let now = self.services.clock.now_millis();
                if let Err(e) = self.managers.rounds.init_round(&mut state, now) {
                    return Err(self.fail(&chain, e));
                }
            }
            chain.publish_round(state.round.as_ref());
            chain.set_status(ChainStatus::Running);
            // Spawned under the lock: a stop or delete queued behind this run
            // finds the task registered and cancels it.
            self.scheduler.create_chain_scheduler(chain.clone());
        }

        tracing::info!(target: "chain", chain_id, "Chain running");
        Ok(())
    }

    fn fail(&self, chain: &Chain, e: ConsensusError) -> ChainError {
        tracing::error!(
            target: "chain",
            chain_id = chain.chain_id(),
            code = e.code(),
            error = %e,
            "Chain cannot schedule; marking failed"
        );
        chain.set_status(ChainStatus::Failed);
        e.into()
    }

    /// Marks the chain stopped under its lock, then cancels its scheduler and
    /// waits for it. No tick and no transaction writes to the chain's tables
    /// after this returns.
    ///
    /// A failed chain keeps its `Failed` status.
    pub async fn stop_chain(&self, chain_id: ChainId) -> Result<(), ChainError> {
        let chain = self.require(chain_id)?;
        if !matches!(chain.status(), ChainStatus::Running | ChainStatus::Failed) {
            return Err(lifecycle_error(&chain, "stop"));
        }
        {
            // Waits out a tick in flight; ticks queued after it see the new status.
            let _state = chain.state().lock().await;
            match chain.status() {
                ChainStatus::Running => chain.set_status(ChainStatus::Stopped),
                ChainStatus::Failed => {}
                _ => return Err(lifecycle_error(&chain, "stop")),
            }
        }
        self.scheduler.cancel(chain_id).await;
        tracing::info!(target: "chain", chain_id, "Chain stopped");
        Ok(())
    }

    /// Stops every running chain.
    pub async fn shutdown(&self) {
        for chain_id in self.chain_ids() {
            if matches!(self.status(chain_id), Some(ChainStatus::Running | ChainStatus::Failed)) {
                if let Err(e) = self.stop_chain(chain_id).await {
                    tracing::warn!(target: "chain", chain_id, error = %e, "Stop failed during shutdown");
                }
            }
        }
    }

    /// Drops the chain's tables, unbinds its transaction types, forgets its
    /// configuration and removes it from the registry. The chain must not be running.
    pub async fn delete_chain(&self, chain_id: ChainId) -> Result<(), ChainError> {
        let chain = self.require(chain_id)?;
        if matches!(chain.status(), ChainStatus::Running | ChainStatus::Deleted) {
            return Err(lifecycle_error(&chain, "delete"));
        }

        let mut state = chain.state().lock().await;
        if matches!(chain.status(), ChainStatus::Running | ChainStatus::Deleted) {
            return Err(lifecycle_error(&chain, "delete"));
        }
        for table in chain_tables(chain_id) {
            self.services.store.drop_table(&table)?;
        }
        self.services
            .store
            .delete(CONFIG_TABLE, &chain_config_key(chain_id))?;
        if let Err(e) = self.services.protocol.unregister_chain(chain_id) {
            tracing::warn!(target: "chain", chain_id, error = %e, "Failed to unbind transaction types");
        }
        state.clear_caches();
        state.clear_headers();
        state.round = None;
        chain.publish_round(None);
        chain.set_status(ChainStatus::Deleted);
        drop(state);

        // A failed chain may still own a task; its ticks now see `Deleted`.
        self.scheduler.cancel(chain_id).await;
        self.chains.remove(&chain_id);
        tracing::info!(target: "chain", chain_id, "Chain deleted");
        Ok(())
    }

    /// Applies a consensus transaction. A rejection leaves the caches untouched.
    pub async fn apply_tx(&self, chain_id: ChainId, tx: ConsensusTx) -> Result<(), ChainError> {
        let chain = self.require(chain_id)?;
        let span = chain.loggers().consensus.clone();
        let result = self.apply_locked(&chain, &tx).instrument(span).await;
        if let Err(e) = &result {
            chain_metrics().inc_tx_rejected(chain_id, e.code());
            tracing::info!(
                target: "chain",
                chain_id,
                tx = %tx.tx_hash(),
                tx_type = tx.tx_type().code(),
                code = e.code(),
                error = %e,
                "Transaction rejected"
            );
        }
        result
    }

    async fn apply_locked(&self, chain: &Chain, tx: &ConsensusTx) -> Result<(), ChainError> {
        let mut state = chain.state().lock().await;
        if chain.status() != ChainStatus::Running {
            return Err(lifecycle_error(chain, "apply transactions"));
        }
        let m = &self.managers;
        match tx {
            ConsensusTx::RegisterAgent(tx) => {
                m.agents.register(&mut state, tx).await?;
            }
            ConsensusTx::StopAgent(tx) => {
                m.agents.validate_stop(&state, tx).await?;
                let released = m
                    .deposits
                    .release_agent_deposits(&mut state, &tx.agent_hash, tx.height)?;
                m.agents.stop(&mut state, tx)?;
                tracing::debug!(target: "consensus", agent = %tx.agent_hash, released, "Deposits released");
            }
            ConsensusTx::Deposit(tx) => {
                m.deposits.apply_deposit(&mut state, tx).await?;
            }
            ConsensusTx::Withdraw(tx) => {
                m.deposits.withdraw(&mut state, tx).await?;
            }
            ConsensusTx::RedPunish(tx) => {
                m.punishes.apply_red_tx(&mut state, tx)?;
            }
        }
        Ok(())
    }

    /// Decodes and applies a raw transaction payload.
    pub async fn apply_raw_tx(&self, chain_id: ChainId, bytes: &[u8]) -> Result<(), ChainError> {
        let chain = self.require(chain_id)?;
        match ConsensusTx::parse(bytes) {
            Ok(tx) => self.apply_tx(chain_id, tx).await,
            Err(e) => {
                let e = ChainError::from(e);
                chain_metrics().inc_tx_rejected(chain.chain_id(), e.code());
                tracing::info!(target: "chain", chain_id, error = %e, "Undecodable transaction rejected");
                Err(e)
            }
        }
    }

    /// Records a missed slot reported by block processing.
    pub async fn report_missed_slot(
        &self,
        chain_id: ChainId,
        agent_hash: TxHash,
        height: u64,
        round_index: u64,
    ) -> Result<(), ChainError> {
        let chain = self.require(chain_id)?;
        let mut state = chain.state().lock().await;
        if chain.status() != ChainStatus::Running {
            return Err(lifecycle_error(&chain, "punish"));
        }
        if state.agent(&agent_hash).is_none() {
            return Err(ValidationError::UnknownPunishTarget(agent_hash).into());
        }
        let now = self.services.clock.now_millis();
        self.managers
            .punishes
            .apply_yellow(&mut state, agent_hash, height, round_index, now)?;
        Ok(())
    }

    /// Runs one scheduler tick of `chain_id` now, outside its timer.
    pub async fn tick_chain(&self, chain_id: ChainId) -> Result<TickReport, ChainError> {
        let chain = self.require(chain_id)?;
        let span = chain.loggers().consensus.clone();
        drive_chain_tick(&chain, self.scheduler.context())
            .instrument(span)
            .await
    }

    /// The current round of `chain_id`, if one has been computed.
    pub fn current_round(&self, chain_id: ChainId) -> Result<Option<Arc<Round>>, ChainError> {
        Ok(self.require(chain_id)?.current_round())
    }

    /// The member scheduled to pack at `now`, or `None` between rounds.
    pub fn slot_owner(
        &self,
        chain_id: ChainId,
        now: u64,
    ) -> Result<Option<RoundMember>, ChainError> {
        let round = self
            .require(chain_id)?
            .current_round()
            .ok_or(ConsensusError::RoundNotReady(chain_id))?;
        Ok(round.slot_at(now).and_then(|slot| round.member(slot)).cloned())
    }

    /// A copy of the active agents of `chain_id`.
    pub async fn agents_snapshot(&self, chain_id: ChainId) -> Result<Vec<Agent>, ChainError> {
        let chain = self.require(chain_id)?;
        let state = chain.state().lock().await;
        Ok(state.agents.clone())
    }

    /// A copy of the active deposits of `chain_id`.
    pub async fn deposits_snapshot(&self, chain_id: ChainId) -> Result<Vec<Deposit>, ChainError> {
        let chain = self.require(chain_id)?;
        let state = chain.state().lock().await;
        Ok(state.deposits.clone())
    }

    pub fn status(&self, chain_id: ChainId) -> Option<ChainStatus> {
        self.chains.get(&chain_id).map(|c| c.status())
    }

    pub fn chain(&self, chain_id: ChainId) -> Option<Arc<Chain>> {
        self.chains.get(&chain_id).map(|c| c.value().clone())
    }

    /// Registered chain ids, ascending.
    pub fn chain_ids(&self) -> Vec<ChainId> {
        let mut ids: Vec<ChainId> = self.chains.iter().map(|c| *c.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_scheduled(&self, chain_id: ChainId) -> bool {
        self.scheduler.is_scheduled(chain_id)
    }

    fn require(&self, chain_id: ChainId) -> Result<Arc<Chain>, ChainError> {
        self.chain(chain_id).ok_or(ChainError::UnknownChain(chain_id))
    }
}
