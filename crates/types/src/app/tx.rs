// Path: crates/types/src/app/tx.rs

//! Consensus transactions and their registry codes.

use super::{Address, Amount, PunishReason, TxHash};
use crate::codec;
use crate::error::TxError;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Transaction type codes owned by the consensus module.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxType {
    /// Register a new agent.
    RegisterAgent,
    /// Delegate stake to an agent.
    Deposit,
    /// Withdraw a deposit.
    Withdraw,
    /// Yellow card for a missed slot.
    YellowPunish,
    /// Red card for a protocol violation.
    RedPunish,
    /// Voluntarily stop an agent.
    StopAgent,
}

impl TxType {
    /// The numeric code bound in the shared transaction-type registry.
    pub fn code(&self) -> u16 {
        match self {
            TxType::RegisterAgent => 4,
            TxType::Deposit => 5,
            TxType::Withdraw => 6,
            TxType::YellowPunish => 7,
            TxType::RedPunish => 8,
            TxType::StopAgent => 9,
        }
    }

    /// Whether a transaction of this type must be packed by the system rather than a user.
    pub fn is_system(&self) -> bool {
        matches!(self, TxType::YellowPunish | TxType::RedPunish)
    }
}

/// Every transaction type this module binds per chain.
pub const CONSENSUS_TX_TYPES: [TxType; 6] = [
    TxType::RegisterAgent,
    TxType::Deposit,
    TxType::Withdraw,
    TxType::YellowPunish,
    TxType::RedPunish,
    TxType::StopAgent,
];

/// Registers a new agent.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RegisterAgentTx {
    pub tx_hash: TxHash,
    pub agent_address: Address,
    pub packing_address: Address,
    pub reward_address: Address,
    pub commission_rate: u8,
    pub deposit: Amount,
    pub fee: Amount,
    pub height: u64,
    pub time: u64,
}

/// Stops an agent. Only its owner may send it.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StopAgentTx {
    pub tx_hash: TxHash,
    pub agent_hash: TxHash,
    pub sender: Address,
    pub fee: Amount,
    pub height: u64,
    pub time: u64,
}

/// Binds stake to an agent.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DepositTx {
    pub tx_hash: TxHash,
    pub agent_hash: TxHash,
    pub depositor: Address,
    pub amount: Amount,
    pub fee: Amount,
    pub height: u64,
    pub time: u64,
}

/// Releases a deposit, referenced by its deposit transaction hash.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WithdrawTx {
    pub tx_hash: TxHash,
    pub deposit_hash: TxHash,
    pub sender: Address,
    pub fee: Amount,
    pub height: u64,
    pub time: u64,
}

/// Issues a red card for a severe protocol violation.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RedPunishTx {
    pub tx_hash: TxHash,
    pub agent_hash: TxHash,
    pub reason: PunishReason,
    /// Opaque proof (e.g. two conflicting signed headers). Not part of the replay key.
    pub evidence: Vec<u8>,
    pub height: u64,
    pub round_index: u64,
    pub time: u64,
}

/// A transaction feeding registration, deposit or punish logic.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusTx {
    RegisterAgent(RegisterAgentTx),
    StopAgent(StopAgentTx),
    Deposit(DepositTx),
    Withdraw(WithdrawTx),
    RedPunish(RedPunishTx),
}

impl ConsensusTx {
    /// Decodes a raw transaction payload.
    pub fn parse(bytes: &[u8]) -> Result<Self, TxError> {
        if bytes.is_empty() {
            return Err(TxError::Empty);
        }
        codec::from_bytes_canonical(bytes).map_err(TxError::Parse)
    }

    /// Encodes the transaction payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        codec::to_bytes_canonical(self)
    }

    /// The registry type of this transaction.
    pub fn tx_type(&self) -> TxType {
        match self {
            ConsensusTx::RegisterAgent(_) => TxType::RegisterAgent,
            ConsensusTx::StopAgent(_) => TxType::StopAgent,
            ConsensusTx::Deposit(_) => TxType::Deposit,
            ConsensusTx::Withdraw(_) => TxType::Withdraw,
            ConsensusTx::RedPunish(_) => TxType::RedPunish,
        }
    }

    /// The hash of this transaction.
    pub fn tx_hash(&self) -> TxHash {
        match self {
            ConsensusTx::RegisterAgent(tx) => tx.tx_hash,
            ConsensusTx::StopAgent(tx) => tx.tx_hash,
            ConsensusTx::Deposit(tx) => tx.tx_hash,
            ConsensusTx::Withdraw(tx) => tx.tx_hash,
            ConsensusTx::RedPunish(tx) => tx.tx_hash,
        }
    }
}
