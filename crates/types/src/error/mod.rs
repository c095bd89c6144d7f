// Path: crates/types/src/error/mod.rs
//! Error taxonomy of the consensus core.
//!
//! Configuration and consensus-invariant errors are fatal to the affected chain.
//! Storage errors during cache loads degrade the chain instead of aborting the node.
//! Validation and parse errors reject one transaction and leave every cache untouched.

use crate::app::{Amount, ChainId, TxHash};
use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors in node or chain configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required configuration source or field is absent.
    #[error("Missing configuration: {0}")]
    Missing(String),
    /// A field holds a value the consensus core cannot run with.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    /// The configuration source could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::Missing(_) => "CONFIG_MISSING",
            Self::Invalid(_) => "CONFIG_INVALID",
            Self::Parse(_) => "CONFIG_PARSE",
        }
    }
}

/// Errors raised by a table store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A generic error originating from the underlying key-value backend.
    #[error("backend error: {0}")]
    Backend(String),
    /// A record could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),
    /// A stored record could not be deserialized.
    #[error("decode error: {0}")]
    Decode(String),
    /// The requested key was not found.
    #[error("not found")]
    NotFound,
    /// `create_table` was called for a table that already exists.
    #[error("table already exists: {0}")]
    TableExists(String),
    /// The table has not been created.
    #[error("table does not exist: {0}")]
    TableMissing(String),
}

impl ErrorCode for StorageError {
    fn code(&self) -> &'static str {
        match self {
            Self::Backend(_) => "STORAGE_BACKEND",
            Self::Encode(_) => "STORAGE_ENCODE",
            Self::Decode(_) => "STORAGE_DECODE",
            Self::NotFound => "STORAGE_NOT_FOUND",
            Self::TableExists(_) => "STORAGE_TABLE_EXISTS",
            Self::TableMissing(_) => "STORAGE_TABLE_MISSING",
        }
    }
}

/// Permanent rejections of a registration, deposit, withdrawal, stop or punish request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The deposit amount is outside `[deposit_min, deposit_max]`.
    #[error("Deposit {amount} outside [{min}, {max}]")]
    DepositOutOfRange {
        /// The rejected amount.
        amount: Amount,
        /// Configured minimum.
        min: Amount,
        /// Configured maximum.
        max: Amount,
    },
    /// A delegated deposit is below `entruster_deposit_min`.
    #[error("Delegated deposit {amount} below minimum {min}")]
    EntrusterDepositTooLow {
        /// The rejected amount.
        amount: Amount,
        /// Configured minimum.
        min: Amount,
    },
    /// The agent's own deposit is outside `[commission_min, commission_max]`.
    #[error("Agent deposit {amount} outside [{min}, {max}]")]
    CommissionOutOfRange {
        /// The rejected amount.
        amount: Amount,
        /// Configured minimum.
        min: Amount,
        /// Configured maximum.
        max: Amount,
    },
    /// The commission rate is outside `[commission_rate_min, commission_rate_max]`.
    #[error("Commission rate {rate} outside [{min}, {max}]")]
    CommissionRateOutOfRange {
        /// The rejected rate.
        rate: u8,
        /// Configured minimum.
        min: u8,
        /// Configured maximum.
        max: u8,
    },
    /// The sender cannot cover the locked amount plus the fee.
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Amount plus fee.
        required: Amount,
        /// Available balance reported by the ledger.
        available: Amount,
    },
    /// No agent with this registration hash is known.
    #[error("Agent not found: {0}")]
    AgentNotFound(TxHash),
    /// The agent exists but is not active.
    #[error("Agent is not active: {0}")]
    AgentNotActive(TxHash),
    /// The sender does not own the agent or deposit.
    #[error("Sender is not the owner")]
    NotOwner,
    /// A transaction with this hash was already applied.
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(TxHash),
    /// No deposit with this hash is known.
    #[error("Deposit not found: {0}")]
    DepositNotFound(TxHash),
    /// The deposit was already withdrawn.
    #[error("Deposit already withdrawn: {0}")]
    DepositAlreadyWithdrawn(TxHash),
    /// Another live agent already uses this owning or packing address.
    #[error("Address already bound to a live agent")]
    AddressInUse,
    /// The owning address belongs to a red-carded agent still inside its lock.
    #[error("Address locked by a red card until {until}")]
    AddressLocked {
        /// End of the lock, in milliseconds.
        until: u64,
    },
    /// The punish request targets an agent this chain has never seen.
    #[error("Unknown punish target: {0}")]
    UnknownPunishTarget(TxHash),
    /// A red punish transaction carried a reason that does not warrant a red card.
    #[error("Reason does not warrant a red card")]
    InvalidRedReason,
}

impl ErrorCode for ValidationError {
    fn code(&self) -> &'static str {
        match self {
            Self::DepositOutOfRange { .. } => "VALIDATION_DEPOSIT_OUT_OF_RANGE",
            Self::EntrusterDepositTooLow { .. } => "VALIDATION_ENTRUSTER_DEPOSIT_TOO_LOW",
            Self::CommissionOutOfRange { .. } => "VALIDATION_COMMISSION_OUT_OF_RANGE",
            Self::CommissionRateOutOfRange { .. } => "VALIDATION_COMMISSION_RATE_OUT_OF_RANGE",
            Self::InsufficientBalance { .. } => "VALIDATION_INSUFFICIENT_BALANCE",
            Self::AgentNotFound(_) => "VALIDATION_AGENT_NOT_FOUND",
            Self::AgentNotActive(_) => "VALIDATION_AGENT_NOT_ACTIVE",
            Self::NotOwner => "VALIDATION_NOT_OWNER",
            Self::DuplicateTransaction(_) => "VALIDATION_DUPLICATE_TX",
            Self::DepositNotFound(_) => "VALIDATION_DEPOSIT_NOT_FOUND",
            Self::DepositAlreadyWithdrawn(_) => "VALIDATION_DEPOSIT_WITHDRAWN",
            Self::AddressInUse => "VALIDATION_ADDRESS_IN_USE",
            Self::AddressLocked { .. } => "VALIDATION_ADDRESS_LOCKED",
            Self::UnknownPunishTarget(_) => "VALIDATION_UNKNOWN_PUNISH_TARGET",
            Self::InvalidRedReason => "VALIDATION_INVALID_RED_REASON",
        }
    }
}

/// Violations that make a chain unable to schedule safely.
#[derive(Error, Debug)]
pub enum ConsensusError {
    /// No agent is eligible, so no round can be computed.
    #[error("Chain {chain_id}: no eligible agents for round {round_index}")]
    EmptyEligibleSet {
        /// The affected chain.
        chain_id: ChainId,
        /// The round that could not be computed.
        round_index: u64,
    },
    /// A persisted record could not be decoded.
    #[error("Corrupt record in table {table}: {reason}")]
    CorruptRecord {
        /// The table holding the record.
        table: String,
        /// Decoder message.
        reason: String,
    },
    /// An operation needed a round but none has been computed yet.
    #[error("Round not ready for chain {0}")]
    RoundNotReady(ChainId),
}

impl ErrorCode for ConsensusError {
    fn code(&self) -> &'static str {
        match self {
            Self::EmptyEligibleSet { .. } => "CONSENSUS_EMPTY_ELIGIBLE_SET",
            Self::CorruptRecord { .. } => "CONSENSUS_CORRUPT_RECORD",
            Self::RoundNotReady(_) => "CONSENSUS_ROUND_NOT_READY",
        }
    }
}

/// Errors decoding an inbound consensus transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    /// The payload was empty.
    #[error("Empty transaction payload")]
    Empty,
    /// The payload did not decode.
    #[error("Failed to parse transaction: {0}")]
    Parse(String),
}

impl ErrorCode for TxError {
    fn code(&self) -> &'static str {
        match self {
            Self::Empty => "TX_EMPTY",
            Self::Parse(_) => "TX_PARSE",
        }
    }
}

/// The top-level error surfaced by chain lifecycle and transaction entry points.
#[derive(Error, Debug)]
pub enum ChainError {
    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// A storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    /// A rejected request.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    /// A consensus invariant violation.
    #[error("Consensus error: {0}")]
    Consensus(#[from] ConsensusError),
    /// A malformed inbound transaction.
    #[error("Transaction error: {0}")]
    Tx(#[from] TxError),
    /// The chain id is not in the registry.
    #[error("Unknown chain: {0}")]
    UnknownChain(ChainId),
    /// The requested lifecycle operation is not allowed from the chain's current state.
    #[error("Chain {chain_id} cannot {operation} while {status}")]
    InvalidLifecycle {
        /// The affected chain.
        chain_id: ChainId,
        /// The chain's current status.
        status: String,
        /// The rejected operation.
        operation: &'static str,
    },
    /// An upstream collaborator (header, ledger or protocol service) failed.
    #[error("Service error: {0}")]
    Service(String),
}

impl ChainError {
    /// True for transient failures worth retrying; validation rejections are permanent.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChainError::Storage(StorageError::Backend(_)) | ChainError::Service(_)
        )
    }
}

impl ErrorCode for ChainError {
    fn code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.code(),
            Self::Storage(e) => e.code(),
            Self::Validation(e) => e.code(),
            Self::Consensus(e) => e.code(),
            Self::Tx(e) => e.code(),
            Self::UnknownChain(_) => "CHAIN_UNKNOWN",
            Self::InvalidLifecycle { .. } => "CHAIN_INVALID_LIFECYCLE",
            Self::Service(_) => "CHAIN_SERVICE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_rejections_are_not_retryable() {
        let err = ChainError::from(ValidationError::DepositOutOfRange {
            amount: 5,
            min: 10,
            max: 1_000,
        });
        assert!(!err.is_retryable());
        assert_eq!(err.code(), "VALIDATION_DEPOSIT_OUT_OF_RANGE");

        let err = ChainError::from(StorageError::Backend("io".into()));
        assert!(err.is_retryable());
        assert_eq!(err.code(), "STORAGE_BACKEND");
    }
}
