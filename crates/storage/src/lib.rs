// Path: crates/storage/src/lib.rs
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

//! Table stores backing the per-chain agent, deposit and punish tables.
//!
//! `RedbTableStore` keeps every table in one redb database and tracks created
//! tables in a catalog table, so "create" is explicit and idempotence is decided
//! by the caller. `MemoryTableStore` has the same semantics without persistence.

pub mod memory;
pub mod redb_table_store;

pub use memory::MemoryTableStore;
pub use redb_table_store::RedbTableStore;
