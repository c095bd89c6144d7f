// Path: crates/types/src/keys.rs

//! Table names and key encodings for the per-chain consensus tables.

use crate::app::ChainId;

/// The node-wide table holding one `ChainConfig` per chain.
pub const CONFIG_TABLE: &str = "consensus_config";
/// Prefix of the per-chain agent table.
pub const AGENT_TABLE_PREFIX: &str = "consensus_agent_";
/// Prefix of the per-chain deposit table.
pub const DEPOSIT_TABLE_PREFIX: &str = "consensus_deposit_";
/// Prefix of the per-chain punish table.
pub const PUNISH_TABLE_PREFIX: &str = "consensus_punish_";

/// The agent table of `chain_id`.
pub fn agent_table(chain_id: ChainId) -> String {
    format!("{}{}", AGENT_TABLE_PREFIX, chain_id)
}

/// The deposit table of `chain_id`.
pub fn deposit_table(chain_id: ChainId) -> String {
    format!("{}{}", DEPOSIT_TABLE_PREFIX, chain_id)
}

/// The punish table of `chain_id`.
pub fn punish_table(chain_id: ChainId) -> String {
    format!("{}{}", PUNISH_TABLE_PREFIX, chain_id)
}

/// The three tables owned by one chain, in creation order.
pub fn chain_tables(chain_id: ChainId) -> [String; 3] {
    [
        agent_table(chain_id),
        deposit_table(chain_id),
        punish_table(chain_id),
    ]
}

/// Key of a chain's entry in [`CONFIG_TABLE`]. Big-endian, so scans are ordered by id.
pub fn chain_config_key(chain_id: ChainId) -> [u8; 4] {
    chain_id.to_be_bytes()
}
