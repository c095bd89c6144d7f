// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
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

//! # Proof-of-Credit Types
//!
//! The foundational library of the consensus core. It holds the data model shared
//! by every other crate: chain configuration, agents, deposits, punishment records,
//! rounds, the consensus transactions that mutate them, and the error taxonomy.
//!
//! ## Architectural Role
//!
//! As the base crate, `poc-types` has minimal dependencies and is a dependency of
//! every other crate in the workspace. Everything persisted or compared across
//! nodes is encoded through [`codec`] so that two honest nodes agree byte-for-byte.

/// A top-level, crate-wide `Result` type alias with a default error type.
pub type Result<T, E = crate::error::ChainError> = std::result::Result<T, E>;

/// Application-level data structures: agents, deposits, punishments, rounds and transactions.
pub mod app;
/// The canonical, deterministic binary codec for persisted consensus state.
pub mod codec;
/// Process defaults and per-chain configuration.
pub mod config;
/// The unified error taxonomy of the consensus core.
pub mod error;
/// Storage table naming and key encoding.
pub mod keys;
