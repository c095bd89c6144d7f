// Path: crates/types/src/app/deposit.rs

use super::{Address, Amount, TxHash};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Status of a stake record.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepositStatus {
    /// Counts toward the target agent's effective stake.
    Active,
    /// Released by a withdrawal or by the agent stopping.
    Withdrawn,
}

/// Stake bound to an agent.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    /// Hash of the deposit transaction. This is the deposit's identity.
    pub tx_hash: TxHash,
    /// The agent this stake backs. A weak reference, resolved by lookup.
    pub agent_hash: TxHash,
    /// The address that locked the funds.
    pub depositor: Address,
    /// Locked amount.
    pub amount: Amount,
    /// Height of the deposit transaction.
    pub height: u64,
    /// Time of the deposit transaction, in milliseconds.
    pub time: u64,
    /// Current status.
    pub status: DepositStatus,
    /// Height at which the deposit was withdrawn, if it was.
    pub withdraw_height: Option<u64>,
}

impl Deposit {
    /// Returns true while the deposit counts toward its agent's stake.
    pub fn is_active(&self) -> bool {
        self.status == DepositStatus::Active
    }
}
