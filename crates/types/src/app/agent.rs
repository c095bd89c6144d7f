// Path: crates/types/src/app/agent.rs

use super::{Address, Amount, TxHash};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Lifecycle of a registered agent.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentStatus {
    /// Eligible for round membership.
    Active,
    /// Voluntarily stopped; waiting for the stop lock to elapse.
    Exiting,
    /// Terminal. Only a new registration brings the operator back.
    Exited,
}

/// A registered validator.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    /// Hash of the registration transaction. This is the agent's identity.
    pub agent_hash: TxHash,
    /// The owning address that registered the agent and locked its deposit.
    pub agent_address: Address,
    /// The address that signs blocks for this agent.
    pub packing_address: Address,
    /// The address receiving block rewards.
    pub reward_address: Address,
    /// Commission rate charged to delegators, in percent.
    pub commission_rate: u8,
    /// The owner's own locked deposit.
    pub deposit: Amount,
    /// Height of the registration transaction.
    pub create_height: u64,
    /// Time of the registration transaction, in milliseconds.
    pub create_time: u64,
    /// Current lifecycle status.
    pub status: AgentStatus,
    /// Derived credit. Recomputed at every round boundary and never persisted.
    #[codec(skip)]
    #[serde(default)]
    pub credit: Amount,
    /// Time the agent was stopped or disqualified, in milliseconds.
    pub stop_time: Option<u64>,
    /// Funds stay locked until this time after a red card, in milliseconds.
    pub locked_until: Option<u64>,
}

impl Agent {
    /// Returns true if the agent may appear in a round.
    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Agent {
        Agent {
            agent_hash: TxHash([7; 32]),
            agent_address: Address([1; 32]),
            packing_address: Address([2; 32]),
            reward_address: Address([1; 32]),
            commission_rate: 20,
            deposit: 500,
            create_height: 3,
            create_time: 3_000,
            status: AgentStatus::Active,
            credit: 450,
            stop_time: None,
            locked_until: None,
        }
    }

    #[test]
    fn json_snapshot_without_credit_defaults_to_zero() {
        let mut value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["status"], "Active");
        value.as_object_mut().unwrap().remove("credit");
        let agent: Agent = serde_json::from_value(value).unwrap();
        assert_eq!(agent.credit, 0);
        assert_eq!(agent.deposit, 500);
    }
}
