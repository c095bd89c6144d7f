// Path: crates/types/src/app/punish.rs

//! Punishment cards.
//!
//! Records are append-only. Replay protection is based on the facts of the
//! offense (agent, height, reason, round), never on who reported it.

use super::TxHash;
use crate::codec;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Severity of a punishment.
#[derive(
    Encode, Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum CardColor {
    /// A soft warning that decays out of the punish window.
    Yellow,
    /// Terminal. The agent is exited.
    Red,
}

impl CardColor {
    /// A stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CardColor::Yellow => "yellow",
            CardColor::Red => "red",
        }
    }
}

/// Why a card was issued.
#[derive(
    Encode, Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum PunishReason {
    /// The agent did not produce its block inside its slot.
    MissedSlot,
    /// The agent signed two different blocks at the same height.
    DoubleSign,
    /// The agent signed conflicting consensus messages.
    Equivocation,
    /// The agent accumulated the yellow-card threshold inside the punish window.
    YellowAccumulation,
}

/// An infraction record.
#[derive(Encode, Decode, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PunishRecord {
    /// The punished agent.
    pub agent_hash: TxHash,
    /// Card color.
    pub color: CardColor,
    /// Block height at issuance.
    pub height: u64,
    /// Reason code.
    pub reason: PunishReason,
    /// The round the offense belongs to.
    pub round_index: u64,
    /// Issuance time, in milliseconds.
    pub time: u64,
}

/// The canonical facts that identify one offense.
#[derive(Encode, Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PunishKey {
    /// The punished agent.
    pub agent_hash: TxHash,
    /// Block height at issuance.
    pub height: u64,
    /// Reason code.
    pub reason: PunishReason,
    /// The round the offense belongs to.
    pub round_index: u64,
}

impl PunishRecord {
    /// Returns the replay-protection key of this record.
    pub fn key(&self) -> PunishKey {
        PunishKey {
            agent_hash: self.agent_hash,
            height: self.height,
            reason: self.reason,
            round_index: self.round_index,
        }
    }

    /// Returns the storage key of this record. Keys sort by agent, then height.
    pub fn storage_key(&self) -> Vec<u8> {
        let key = self.key();
        let mut out = Vec::with_capacity(32 + 8 + 8 + 1);
        out.extend_from_slice(&key.agent_hash.0);
        out.extend_from_slice(&key.height.to_be_bytes());
        out.extend_from_slice(&key.round_index.to_be_bytes());
        out.extend_from_slice(&codec::to_bytes_canonical(&key.reason));
        out
    }

    /// Returns true for a red card.
    pub fn is_red(&self) -> bool {
        self.color == CardColor::Red
    }
}
