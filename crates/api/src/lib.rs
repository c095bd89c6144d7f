// Path: crates/api/src/lib.rs
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
//! # Proof-of-Credit API
//!
//! Core traits the consensus core consumes from the rest of the node. The storage
//! engine, block headers, balances and the transaction-type registry all live
//! outside this workspace's scope; these traits are the contract.

/// The upstream block-header service.
pub mod chain;
/// The account / ledger service used for balance checks.
pub mod ledger;
/// The protocol registry binding transaction types per chain.
pub mod protocol;
/// The table-scoped key-value store contract.
pub mod storage;
/// Wall-clock abstraction.
pub mod time;

/// Error raised by an upstream collaborator.
#[derive(Debug, thiserror::Error)]
#[error("{service}: {message}")]
pub struct ServiceError {
    /// Which collaborator failed.
    pub service: &'static str,
    /// Collaborator-supplied detail.
    pub message: String,
}

impl ServiceError {
    /// Creates a new error attributed to `service`.
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

impl From<ServiceError> for poc_types::error::ChainError {
    fn from(e: ServiceError) -> Self {
        poc_types::error::ChainError::Service(e.to_string())
    }
}
