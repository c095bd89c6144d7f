// Path: crates/types/src/config/mod.rs

//! Process-level consensus defaults and the persisted per-chain configuration.
use crate::app::{Amount, ChainId};
use crate::error::ConfigError;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Milliseconds in a 365-day year. Used to derive the per-block reward.
pub const YEAR_MILLIS: u128 = 365 * 24 * 60 * 60 * 1_000;

const UNIT: Amount = 100_000_000;

fn default_chain_id() -> ChainId {
    1
}
fn default_assets_id() -> u32 {
    1
}
fn default_packing_interval_ms() -> u64 {
    10_000
}
fn default_block_max_size() -> u32 {
    5 * 1024 * 1024
}
fn default_commission_min() -> Amount {
    20_000 * UNIT
}
fn default_commission_max() -> Amount {
    200_000 * UNIT
}
fn default_commission_rate_min() -> u8 {
    10
}
fn default_commission_rate_max() -> u8 {
    100
}
fn default_deposit_min() -> Amount {
    2_000 * UNIT
}
fn default_deposit_max() -> Amount {
    500_000 * UNIT
}
fn default_entruster_deposit_min() -> Amount {
    2_000 * UNIT
}
fn default_inflation_amount() -> Amount {
    5_000_000 * UNIT
}
fn default_lock_secs() -> u64 {
    3 * 24 * 60 * 60
}
fn default_yellow_card_threshold() -> u32 {
    3
}
fn default_punish_window_rounds() -> u64 {
    100
}

/// Process defaults used to synthesize the first chain on a fresh node.
///
/// Read from the `[consensus]` table of the node configuration file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ConsensusConfig {
    /// Id of the main chain.
    #[serde(default = "default_chain_id")]
    pub chain_id: ChainId,
    /// Id of the chain's native asset.
    #[serde(default = "default_assets_id")]
    pub assets_id: u32,
    /// Slot length, in milliseconds.
    #[serde(default = "default_packing_interval_ms")]
    pub packing_interval_ms: u64,
    /// Maximum block size, in bytes.
    #[serde(default = "default_block_max_size")]
    pub block_max_size: u32,
    /// Minimum own deposit to register an agent.
    #[serde(default = "default_commission_min")]
    pub commission_min: Amount,
    /// Maximum own deposit to register an agent.
    #[serde(default = "default_commission_max")]
    pub commission_max: Amount,
    /// Minimum commission rate, in percent.
    #[serde(default = "default_commission_rate_min")]
    pub commission_rate_min: u8,
    /// Maximum commission rate, in percent.
    #[serde(default = "default_commission_rate_max")]
    pub commission_rate_max: u8,
    /// Minimum accepted deposit.
    #[serde(default = "default_deposit_min")]
    pub deposit_min: Amount,
    /// Maximum accepted deposit.
    #[serde(default = "default_deposit_max")]
    pub deposit_max: Amount,
    /// Minimum deposit delegated by an address other than the agent owner.
    #[serde(default = "default_entruster_deposit_min")]
    pub entruster_deposit_min: Amount,
    /// Yearly inflation.
    #[serde(default = "default_inflation_amount")]
    pub inflation_amount: Amount,
    /// How long a red-carded agent's funds stay locked, in seconds.
    #[serde(default = "default_lock_secs")]
    pub red_publish_lock_time: u64,
    /// How long a stopped agent's funds stay locked, in seconds.
    #[serde(default = "default_lock_secs")]
    pub stop_agent_lock_time: u64,
    /// Seed node addresses.
    #[serde(default)]
    pub seed_nodes: Vec<String>,
    /// Hash of the chain operator password.
    #[serde(default)]
    pub password: String,
    /// Yellow cards inside the punish window that force a red card.
    #[serde(default = "default_yellow_card_threshold")]
    pub yellow_card_threshold: u32,
    /// Size of the trailing yellow-card window, in rounds.
    #[serde(default = "default_punish_window_rounds")]
    pub punish_window_rounds: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            assets_id: default_assets_id(),
            packing_interval_ms: default_packing_interval_ms(),
            block_max_size: default_block_max_size(),
            commission_min: default_commission_min(),
            commission_max: default_commission_max(),
            commission_rate_min: default_commission_rate_min(),
            commission_rate_max: default_commission_rate_max(),
            deposit_min: default_deposit_min(),
            deposit_max: default_deposit_max(),
            entruster_deposit_min: default_entruster_deposit_min(),
            inflation_amount: default_inflation_amount(),
            red_publish_lock_time: default_lock_secs(),
            stop_agent_lock_time: default_lock_secs(),
            seed_nodes: Vec::new(),
            password: String::new(),
            yellow_card_threshold: default_yellow_card_threshold(),
            punish_window_rounds: default_punish_window_rounds(),
        }
    }
}

impl ConsensusConfig {
    /// Parses the defaults from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validates the defaults by validating the chain configuration they produce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ChainConfig::from_defaults(self).validate()
    }
}

/// Immutable per-chain parameters.
///
/// Persisted SCALE-encoded in the config table and loaded once at chain creation.
/// A change requires a new registration, never a mutation.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: ChainId,
    pub assets_id: u32,
    /// Slot length, in milliseconds.
    pub packing_interval: u64,
    pub block_max_size: u32,
    pub commission_min: Amount,
    pub commission_max: Amount,
    pub commission_rate_min: u8,
    pub commission_rate_max: u8,
    pub deposit_min: Amount,
    pub deposit_max: Amount,
    pub entruster_deposit_min: Amount,
    pub inflation_amount: Amount,
    /// `inflation_amount / (YEAR_MILLIS / packing_interval)`.
    pub block_reward: Amount,
    /// Seconds.
    pub red_publish_lock_time: u64,
    /// Seconds.
    pub stop_agent_lock_time: u64,
    pub seed_nodes: Vec<String>,
    pub password: String,
    pub yellow_card_threshold: u32,
    pub punish_window_rounds: u64,
}

/// Derives the per-block reward from the yearly inflation and the slot length.
pub fn derive_block_reward(inflation_amount: Amount, packing_interval_ms: u64) -> Amount {
    YEAR_MILLIS
        .checked_div(u128::from(packing_interval_ms))
        .and_then(|blocks_per_year| inflation_amount.checked_div(blocks_per_year))
        .unwrap_or(0)
}

impl ChainConfig {
    /// Synthesizes a chain configuration from process defaults.
    pub fn from_defaults(defaults: &ConsensusConfig) -> Self {
        Self {
            chain_id: defaults.chain_id,
            assets_id: defaults.assets_id,
            packing_interval: defaults.packing_interval_ms,
            block_max_size: defaults.block_max_size,
            commission_min: defaults.commission_min,
            commission_max: defaults.commission_max,
            commission_rate_min: defaults.commission_rate_min,
            commission_rate_max: defaults.commission_rate_max,
            deposit_min: defaults.deposit_min,
            deposit_max: defaults.deposit_max,
            entruster_deposit_min: defaults.entruster_deposit_min,
            inflation_amount: defaults.inflation_amount,
            block_reward: derive_block_reward(
                defaults.inflation_amount,
                defaults.packing_interval_ms,
            ),
            red_publish_lock_time: defaults.red_publish_lock_time,
            stop_agent_lock_time: defaults.stop_agent_lock_time,
            seed_nodes: defaults.seed_nodes.clone(),
            password: defaults.password.clone(),
            yellow_card_threshold: defaults.yellow_card_threshold,
            punish_window_rounds: defaults.punish_window_rounds,
        }
    }

    /// Validates the configuration for semantic correctness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.packing_interval == 0 {
            return Err(ConfigError::Invalid(format!(
                "chain {}: 'packing_interval' must be greater than 0",
                self.chain_id
            )));
        }
        if self.commission_min > self.commission_max {
            return Err(ConfigError::Invalid(format!(
                "chain {}: 'commission_min' exceeds 'commission_max'",
                self.chain_id
            )));
        }
        if self.commission_rate_min > self.commission_rate_max || self.commission_rate_max > 100 {
            return Err(ConfigError::Invalid(format!(
                "chain {}: commission rate bounds must satisfy min <= max <= 100",
                self.chain_id
            )));
        }
        if self.deposit_min > self.deposit_max {
            return Err(ConfigError::Invalid(format!(
                "chain {}: 'deposit_min' exceeds 'deposit_max'",
                self.chain_id
            )));
        }
        if self.yellow_card_threshold == 0 {
            return Err(ConfigError::Invalid(format!(
                "chain {}: 'yellow_card_threshold' must be greater than 0",
                self.chain_id
            )));
        }
        if self.punish_window_rounds == 0 {
            return Err(ConfigError::Invalid(format!(
                "chain {}: 'punish_window_rounds' must be greater than 0",
                self.chain_id
            )));
        }
        Ok(())
    }

    /// Red-card lock, in milliseconds.
    pub fn red_lock_millis(&self) -> u64 {
        self.red_publish_lock_time.saturating_mul(1_000)
    }

    /// Agent-stop lock, in milliseconds.
    pub fn stop_lock_millis(&self) -> u64 {
        self.stop_agent_lock_time.saturating_mul(1_000)
    }
}
