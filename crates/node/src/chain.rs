// Path: crates/node/src/chain.rs

use parking_lot::RwLock;
use poc_consensus::ChainState;
use poc_telemetry::chain_metrics;
use poc_types::app::{ChainId, Round};
use poc_types::config::ChainConfig;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::Span;

/// Lifecycle of a hosted chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    /// Known but without configuration.
    Unconfigured,
    /// Configuration loaded and tables opened.
    Initialized,
    /// Caches loaded and the scheduler running.
    Running,
    /// Scheduler cancelled; caches kept until the next run.
    Stopped,
    /// Scheduling is unsafe (empty eligible set, corrupt history). Needs operator action.
    Failed,
    /// Tables dropped and removed from the registry.
    Deleted,
}

impl ChainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainStatus::Unconfigured => "unconfigured",
            ChainStatus::Initialized => "initialized",
            ChainStatus::Running => "running",
            ChainStatus::Stopped => "stopped",
            ChainStatus::Failed => "failed",
            ChainStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two named logger handles of a chain.
///
/// `consensus` scopes scheduling and punishment events, `basic` scopes
/// lifecycle events. Both carry the chain id, so every event logged inside
/// them is attributable to its chain.
#[derive(Debug, Clone)]
pub struct ChainLoggers {
    pub consensus: Span,
    pub basic: Span,
}

impl ChainLoggers {
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            consensus: tracing::info_span!(target: "consensus", "consensus", chain_id),
            basic: tracing::info_span!(target: "chain", "chain", chain_id),
        }
    }
}

/// The runtime aggregate of one hosted chain.
pub struct Chain {
    config: Arc<ChainConfig>,
    status: RwLock<ChainStatus>,
    state: Mutex<ChainState>,
    round_tx: watch::Sender<Option<Arc<Round>>>,
    loggers: ChainLoggers,
}

impl Chain {
    pub fn new(config: ChainConfig, header_tail_len: usize) -> Self {
        let config = Arc::new(config);
        let loggers = ChainLoggers::new(config.chain_id);
        let (round_tx, _) = watch::channel(None);
        Self {
            state: Mutex::new(ChainState::new(config.clone(), header_tail_len)),
            config,
            status: RwLock::new(ChainStatus::Unconfigured),
            round_tx,
            loggers,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.config.chain_id
    }

    pub fn config(&self) -> &Arc<ChainConfig> {
        &self.config
    }

    pub fn status(&self) -> ChainStatus {
        *self.status.read()
    }

    pub fn set_status(&self, status: ChainStatus) {
        let previous = std::mem::replace(&mut *self.status.write(), status);
        if previous != status {
            chain_metrics().set_chain_status(self.chain_id(), status.as_str());
            tracing::info!(
                target: "chain",
                parent: &self.loggers.basic,
                from = %previous,
                to = %status,
                "Chain status changed"
            );
        }
    }

    /// The per-chain critical section around every cache mutation.
    pub fn state(&self) -> &Mutex<ChainState> {
        &self.state
    }

    pub fn loggers(&self) -> &ChainLoggers {
        &self.loggers
    }

    /// The latest published round. Lock-free; may trail the cache by one tick.
    pub fn current_round(&self) -> Option<Arc<Round>> {
        self.round_tx.borrow().clone()
    }

    /// Notifies on every published round change.
    pub fn subscribe_rounds(&self) -> watch::Receiver<Option<Arc<Round>>> {
        self.round_tx.subscribe()
    }

    /// Publishes `round` to readers if it differs from the last published one.
    pub fn publish_round(&self, round: Option<&Round>) {
        self.round_tx.send_if_modified(|current| {
            if current.as_deref() == round {
                return false;
            }
            *current = round.cloned().map(Arc::new);
            true
        });
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("chain_id", &self.chain_id())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
