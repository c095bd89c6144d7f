// Path: crates/types/src/app/round.rs

use super::{Address, Amount, TxHash};
use serde::{Deserialize, Serialize};

/// One scheduled producer inside a round.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RoundMember {
    /// The scheduled agent.
    pub agent_hash: TxHash,
    /// The agent's owning address, used as the ordering tie-break.
    pub agent_address: Address,
    /// The address expected to sign the slot's block.
    pub packing_address: Address,
    /// Credit at round-computation time.
    pub credit: Amount,
    /// Position in the packing order.
    pub slot: u32,
}

/// The unit of scheduling: one full rotation through the eligible agents.
///
/// A round is never persisted. It is a pure function of durable agent, deposit
/// and punish state plus the round index and start time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Round {
    /// Monotonic round index.
    pub index: u64,
    /// Start time, in milliseconds.
    pub start_time: u64,
    /// Slot length, in milliseconds.
    pub packing_interval: u64,
    /// The packing order.
    pub members: Vec<RoundMember>,
    /// Next slot whose outcome has not been settled yet.
    pub position: u32,
}

impl Round {
    /// Number of scheduled producers.
    pub fn member_count(&self) -> u32 {
        u32::try_from(self.members.len()).unwrap_or(u32::MAX)
    }

    /// Total round duration: `members × packing interval`.
    pub fn duration(&self) -> u64 {
        u64::from(self.member_count()).saturating_mul(self.packing_interval)
    }

    /// `start_time + members × packing_interval`.
    pub fn end_time(&self) -> u64 {
        self.start_time.saturating_add(self.duration())
    }

    /// Expected block time of `slot`: `start_time + slot × packing_interval`.
    pub fn slot_time(&self, slot: u32) -> Option<u64> {
        if slot >= self.member_count() {
            return None;
        }
        Some(
            self.start_time
                .saturating_add(u64::from(slot).saturating_mul(self.packing_interval)),
        )
    }

    /// The moment after which `slot` can no longer be filled.
    pub fn slot_deadline(&self, slot: u32) -> Option<u64> {
        self.slot_time(slot)
            .map(|t| t.saturating_add(self.packing_interval))
    }

    /// The slot open at `now`, if `now` falls inside the round.
    pub fn slot_at(&self, now: u64) -> Option<u32> {
        if now < self.start_time || now >= self.end_time() || self.packing_interval == 0 {
            return None;
        }
        u32::try_from((now - self.start_time) / self.packing_interval).ok()
    }

    /// The member scheduled in `slot`.
    pub fn member(&self, slot: u32) -> Option<&RoundMember> {
        self.members.get(slot as usize)
    }

    /// Returns true if `agent_hash` is scheduled in this round.
    pub fn contains(&self, agent_hash: &TxHash) -> bool {
        self.members.iter().any(|m| &m.agent_hash == agent_hash)
    }

    /// The agent hashes in packing order.
    pub fn packing_order(&self) -> Vec<TxHash> {
        self.members.iter().map(|m| m.agent_hash).collect()
    }
}

/// Which signal moved the chain to a new round.
///
/// Wall-clock interval arithmetic and observed block headers can disagree
/// during a partition; both are checked and the one that fired is recorded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundAdvance {
    /// `now` crossed the end of the current round.
    ByTime,
    /// A block header carried a later round index than the local one.
    ByHeight,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(slot: u32) -> RoundMember {
        RoundMember {
            agent_hash: TxHash([slot as u8; 32]),
            agent_address: Address([slot as u8; 32]),
            packing_address: Address([slot as u8 + 100; 32]),
            credit: 10,
            slot,
        }
    }

    fn round(members: u32) -> Round {
        Round {
            index: 7,
            start_time: 1_000,
            packing_interval: 10_000,
            members: (0..members).map(member).collect(),
            position: 0,
        }
    }

    #[test]
    fn end_time_is_start_plus_members_times_interval() {
        for n in [1u32, 2, 5, 21] {
            let r = round(n);
            assert_eq!(r.end_time(), 1_000 + u64::from(n) * 10_000);
        }
    }

    #[test]
    fn slot_times_are_fixed_offsets() {
        let r = round(3);
        assert_eq!(r.slot_time(0), Some(1_000));
        assert_eq!(r.slot_time(2), Some(21_000));
        assert_eq!(r.slot_time(3), None);
        assert_eq!(r.slot_deadline(2), Some(31_000));
    }

    #[test]
    fn slot_at_maps_time_to_slot() {
        let r = round(3);
        assert_eq!(r.slot_at(999), None);
        assert_eq!(r.slot_at(1_000), Some(0));
        assert_eq!(r.slot_at(10_999), Some(0));
        assert_eq!(r.slot_at(11_000), Some(1));
        assert_eq!(r.slot_at(31_000), None);
    }
}
