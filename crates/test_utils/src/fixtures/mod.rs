//! Builders for records and transactions with small, readable amounts.
//!
//! Byte seeds fill the 32-byte hashes and addresses, so `agent(1, 1, ..)` has
//! hash `[1; 32]` and owning address `[1; 32]`. Packing addresses are the
//! owning seed plus `0x80`.

use poc_types::app::{
    Address, Agent, AgentStatus, Amount, BlockHeaderSummary, CardColor, ChainId, Deposit,
    DepositStatus, DepositTx, PunishReason, PunishRecord, RedPunishTx, RegisterAgentTx,
    StopAgentTx, TxHash, WithdrawTx,
};
use poc_types::config::{ChainConfig, ConsensusConfig};

/// Slot length used by every fixture config, in milliseconds.
pub const TEST_PACKING_INTERVAL: u64 = 1_000;

fn packing(addr: u8) -> Address {
    Address([addr.wrapping_add(0x80); 32])
}

/// Process defaults matching [`test_chain_config`].
pub fn test_consensus_config(chain_id: ChainId) -> ConsensusConfig {
    ConsensusConfig {
        chain_id,
        packing_interval_ms: TEST_PACKING_INTERVAL,
        commission_min: 100,
        commission_max: 10_000,
        commission_rate_min: 10,
        commission_rate_max: 100,
        deposit_min: 10,
        deposit_max: 1_000,
        entruster_deposit_min: 20,
        inflation_amount: 3_153_600_000,
        red_publish_lock_time: 60,
        stop_agent_lock_time: 30,
        yellow_card_threshold: 3,
        punish_window_rounds: 100,
        ..ConsensusConfig::default()
    }
}

/// A chain config with deposit bounds `[10, 1000]`, agent deposits in
/// `[100, 10000]`, 1s slots, a yellow threshold of 3 and a 100-round window.
pub fn test_chain_config(chain_id: ChainId) -> ChainConfig {
    ChainConfig::from_defaults(&test_consensus_config(chain_id))
}

/// An active agent.
pub fn agent(seed: u8, addr: u8, deposit: Amount) -> Agent {
    Agent {
        agent_hash: TxHash([seed; 32]),
        agent_address: Address([addr; 32]),
        packing_address: packing(addr),
        reward_address: Address([addr; 32]),
        commission_rate: 20,
        deposit,
        create_height: 1,
        create_time: 0,
        status: AgentStatus::Active,
        credit: 0,
        stop_time: None,
        locked_until: None,
    }
}

/// An active deposit on `agent` by depositor `[seed; 32]`.
pub fn deposit(seed: u8, agent: &Agent, amount: Amount) -> Deposit {
    Deposit {
        tx_hash: TxHash([seed; 32]),
        agent_hash: agent.agent_hash,
        depositor: Address([seed; 32]),
        amount,
        height: 2,
        time: 0,
        status: DepositStatus::Active,
        withdraw_height: None,
    }
}

/// A missed-slot yellow card.
pub fn yellow(agent: &Agent, height: u64, round_index: u64) -> PunishRecord {
    PunishRecord {
        agent_hash: agent.agent_hash,
        color: CardColor::Yellow,
        height,
        reason: PunishReason::MissedSlot,
        round_index,
        time: height.saturating_mul(1_000),
    }
}

/// A header produced in `slot` of the given round, timed at the slot start.
pub fn header(height: u64, round_index: u64, round_start_time: u64, slot: u32) -> BlockHeaderSummary {
    BlockHeaderSummary {
        height,
        time: round_start_time.saturating_add(u64::from(slot).saturating_mul(TEST_PACKING_INTERVAL)),
        packing_address: Address::default(),
        round_index,
        round_start_time,
        slot,
    }
}

/// Registers an agent owned by `[addr; 32]`, with a fee of 1.
pub fn register_tx(seed: u8, addr: u8, deposit: Amount) -> RegisterAgentTx {
    RegisterAgentTx {
        tx_hash: TxHash([seed; 32]),
        agent_address: Address([addr; 32]),
        packing_address: packing(addr),
        reward_address: Address([addr; 32]),
        commission_rate: 20,
        deposit,
        fee: 1,
        height: u64::from(seed),
        time: u64::from(seed).saturating_mul(1_000),
    }
}

/// Deposits `amount` on `agent` from `[depositor; 32]`, with a fee of 1.
pub fn deposit_tx(seed: u8, agent: &Agent, depositor: u8, amount: Amount) -> DepositTx {
    DepositTx {
        tx_hash: TxHash([seed; 32]),
        agent_hash: agent.agent_hash,
        depositor: Address([depositor; 32]),
        amount,
        fee: 1,
        height: u64::from(seed),
        time: u64::from(seed).saturating_mul(1_000),
    }
}

/// Withdraws the deposit `deposit_hash`.
pub fn withdraw_tx(seed: u8, deposit_hash: TxHash, sender: Address) -> WithdrawTx {
    WithdrawTx {
        tx_hash: TxHash([seed; 32]),
        deposit_hash,
        sender,
        fee: 1,
        height: u64::from(seed),
        time: u64::from(seed).saturating_mul(1_000),
    }
}

/// Stops `agent`, sent by its owner.
pub fn stop_tx(seed: u8, agent: &Agent, time: u64) -> StopAgentTx {
    StopAgentTx {
        tx_hash: TxHash([seed; 32]),
        agent_hash: agent.agent_hash,
        sender: agent.agent_address,
        fee: 1,
        height: u64::from(seed),
        time,
    }
}

/// A double-sign red punish transaction against `agent_hash`.
pub fn red_tx(seed: u8, agent_hash: TxHash, height: u64, round_index: u64) -> RedPunishTx {
    RedPunishTx {
        tx_hash: TxHash([seed; 32]),
        agent_hash,
        reason: PunishReason::DoubleSign,
        evidence: vec![seed; 8],
        height,
        round_index,
        time: height.saturating_mul(1_000),
    }
}
