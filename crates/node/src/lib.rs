// Path: crates/node/src/lib.rs
#![forbid(unsafe_code)]
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # Proof-of-Credit Node
//!
//! Hosts several independently configured chains in one process. The
//! [`ChainManager`] owns the chain registry and drives each chain through
//! `Unconfigured → Initialized → Running → Stopped`; the [`SchedulerManager`]
//! runs one cancellable tokio task per running chain.
//!
//! Chains share nothing but the registry. Each chain's caches sit behind its own
//! lock, so a scheduler tick and a transaction on the same chain are serialized
//! while two chains never wait on each other.

pub mod chain;
pub mod config;
pub mod manager;
pub mod scheduler;

pub use chain::{Chain, ChainLoggers, ChainStatus};
pub use config::NodeConfig;
pub use manager::{ChainManager, ConsensusManagers, NodeServices};
pub use scheduler::{drive_chain_tick, SchedulerManager, TickContext};
