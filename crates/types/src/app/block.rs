// Path: crates/types/src/app/block.rs

use super::Address;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// The consensus-relevant part of a block header.
///
/// Every block records the round it was packed in and the slot of its packer,
/// which is what lets a restarting node rebuild the round it stopped in.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BlockHeaderSummary {
    /// Block height.
    pub height: u64,
    /// Block time, in milliseconds.
    pub time: u64,
    /// The packing address that produced the block.
    pub packing_address: Address,
    /// Index of the round the block was packed in.
    pub round_index: u64,
    /// Start time of that round, in milliseconds.
    pub round_start_time: u64,
    /// The packer's slot inside the round.
    pub slot: u32,
}
