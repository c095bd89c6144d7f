// Path: crates/test_utils/src/lib.rs
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

//! # Consensus Test Utilities
//!
//! Mock collaborators, fixture builders and assertion helpers shared by the
//! unit and integration tests of the consensus core.

pub mod assertions;
pub mod fixtures;
pub mod mocks;
pub mod randomness;

pub use mocks::{FaultyStore, ManualClock, MockHeaderService, MockLedger, MockProtocolRegistry};
