// Path: crates/consensus/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented,
        clippy::indexing_slicing
    )
)]
//! Credit accounting and round scheduling for one chain.
//!
//! Every manager operates on a [`ChainState`] it is handed by the caller. The
//! caller owns the per-chain critical section; nothing in this crate locks.
//! Credit, card and round computations are pure functions over snapshots, and
//! the managers are thin stateful wrappers that persist first and then update
//! the cache.

pub mod agent;
pub mod deposit;
pub mod punish;
pub mod round;
pub mod state;

pub use agent::AgentManager;
pub use deposit::DepositManager;
pub use punish::PunishManager;
pub use round::{RoundManager, TickReport};
pub use state::ChainState;
