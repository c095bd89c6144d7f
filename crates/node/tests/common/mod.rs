// Path: crates/node/tests/common/mod.rs

#![allow(dead_code)]

use poc_api::storage::TableStore;
use poc_node::{ChainManager, NodeServices};
use poc_storage::MemoryTableStore;
use poc_test_utils::fixtures::test_consensus_config;
use poc_test_utils::{ManualClock, MockHeaderService, MockLedger, MockProtocolRegistry};
use poc_types::app::{Address, ChainId};
use poc_types::config::{ChainConfig, ConsensusConfig};
use std::sync::Arc;
use std::time::Duration;

/// Fixed wall-clock time of every harness, in milliseconds.
pub const T0: u64 = 1_000_000;

/// A slot long enough that the scheduler's timer never fires twice in a test;
/// ticks past the first are driven through `ChainManager::tick_chain`.
pub const SLOW_INTERVAL: u64 = 60_000;

pub const PROTOCOL_VERSION: u16 = 3;

pub fn slow_defaults(chain_id: ChainId) -> ConsensusConfig {
    ConsensusConfig {
        packing_interval_ms: SLOW_INTERVAL,
        ..test_consensus_config(chain_id)
    }
}

pub fn slow_chain_config(chain_id: ChainId) -> ChainConfig {
    ChainConfig::from_defaults(&slow_defaults(chain_id))
}

pub struct Harness {
    pub store: Arc<dyn TableStore>,
    pub headers: Arc<MockHeaderService>,
    pub ledger: Arc<MockLedger>,
    pub protocol: Arc<MockProtocolRegistry>,
    pub clock: Arc<ManualClock>,
    pub manager: Arc<ChainManager>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryTableStore::new()))
    }

    pub fn with_store(store: Arc<dyn TableStore>) -> Self {
        Self::with_parts(
            store,
            Arc::new(MockHeaderService::new()),
            Arc::new(MockLedger::new()),
            Arc::new(ManualClock::new(T0)),
        )
    }

    /// A second node over the same collaborators, as after a process restart.
    pub fn restarted(&self, store: Arc<dyn TableStore>) -> Self {
        Self::with_parts(
            store,
            self.headers.clone(),
            self.ledger.clone(),
            self.clock.clone(),
        )
    }

    fn with_parts(
        store: Arc<dyn TableStore>,
        headers: Arc<MockHeaderService>,
        ledger: Arc<MockLedger>,
        clock: Arc<ManualClock>,
    ) -> Self {
        let protocol = Arc::new(MockProtocolRegistry::new(PROTOCOL_VERSION));
        let services = NodeServices {
            store: store.clone(),
            headers: headers.clone(),
            ledger: ledger.clone(),
            protocol: protocol.clone(),
            clock: clock.clone(),
        };
        let manager = Arc::new(ChainManager::new(services, slow_defaults(1), 16));
        Self {
            store,
            headers,
            ledger,
            protocol,
            clock,
            manager,
        }
    }

    /// Starts the node and waits until each chain's scheduler has entered its
    /// first tick. Later calls on a chain queue behind that tick, so tests see
    /// a deterministic order.
    pub async fn start(&self) -> Vec<ChainId> {
        let baseline = self.headers.polls();
        let running = self.manager.start().await.unwrap();
        while self.headers.polls() < baseline + running.len() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        running
    }

    /// Funds the owning addresses `[seed; 32]`.
    pub fn fund(&self, seeds: &[u8]) {
        for seed in seeds {
            self.ledger.set_balance(Address([*seed; 32]), 1_000_000);
        }
    }
}
