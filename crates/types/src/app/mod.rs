// Path: crates/types/src/app/mod.rs

//! Core application-level data structures for the scheduling and credit layer.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;

mod agent;
mod block;
mod deposit;
mod punish;
mod round;
mod tx;

pub use agent::*;
pub use block::*;
pub use deposit::*;
pub use punish::*;
pub use round::*;
pub use tx::*;

/// Identifies one logical chain hosted by the node.
pub type ChainId = u32;

/// An amount of the chain's native asset, in its smallest unit.
pub type Amount = u128;

/// A 32-byte account address.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Serialize, Deserialize,
)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Returns the raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// A 32-byte transaction hash. Agents are identified by the hash of their
/// registration transaction, deposits by the hash of their deposit transaction.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Serialize, Deserialize,
)]
pub struct TxHash(pub [u8; 32]);

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", hex::encode(self.0))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
