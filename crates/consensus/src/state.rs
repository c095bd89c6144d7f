// Path: crates/consensus/src/state.rs

use poc_types::app::{
    Address, Agent, BlockHeaderSummary, ChainId, Deposit, PunishRecord, Round, RoundAdvance,
    TxHash,
};
use poc_types::config::ChainConfig;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

/// The in-memory caches of one chain.
///
/// Owned by the chain's runtime aggregate and only ever touched while its
/// per-chain lock is held, so round computation never observes a half-applied
/// punishment or deposit.
#[derive(Debug, Clone)]
pub struct ChainState {
    pub chain_id: ChainId,
    pub config: Arc<ChainConfig>,
    /// Active agents. Only these may be scheduled.
    pub agents: Vec<Agent>,
    /// Stopped agents still inside their stop lock.
    pub pending_exits: Vec<Agent>,
    /// Active deposits whose agent is in `agents`.
    pub deposits: Vec<Deposit>,
    /// Owning addresses of red-carded agents and the time their lock ends.
    pub locks: BTreeMap<Address, u64>,
    /// Punish history per agent, ascending by height.
    pub punishes: BTreeMap<TxHash, Vec<PunishRecord>>,
    /// The most recent block headers, ascending by height.
    pub headers: VecDeque<BlockHeaderSummary>,
    /// Maximum number of headers kept in `headers`.
    pub header_tail_len: usize,
    /// `(round index, slot)` of every header seen for the current round or later.
    /// Kept apart from `headers` so a short tail never hides a filled slot.
    pub filled_slots: BTreeSet<(u64, u32)>,
    pub round: Option<Round>,
    /// The signal that produced the current round, if it replaced an earlier one.
    pub last_advance: Option<RoundAdvance>,
}

impl ChainState {
    pub fn new(config: Arc<ChainConfig>, header_tail_len: usize) -> Self {
        Self {
            chain_id: config.chain_id,
            config,
            agents: Vec::new(),
            pending_exits: Vec::new(),
            deposits: Vec::new(),
            locks: BTreeMap::new(),
            punishes: BTreeMap::new(),
            headers: VecDeque::new(),
            header_tail_len: header_tail_len.max(1),
            filled_slots: BTreeSet::new(),
            round: None,
            last_advance: None,
        }
    }

    /// Height of the newest header seen, or 0 before any.
    pub fn last_height(&self) -> u64 {
        self.headers.back().map(|h| h.height).unwrap_or(0)
    }

    /// Appends headers newer than the tail, dropping the oldest beyond the tail length.
    ///
    /// Returns how many headers were accepted.
    pub fn push_headers<I>(&mut self, headers: I) -> usize
    where
        I: IntoIterator<Item = BlockHeaderSummary>,
    {
        let mut accepted = 0;
        for header in headers {
            if !self.headers.is_empty() && header.height <= self.last_height() {
                continue;
            }
            self.filled_slots.insert((header.round_index, header.slot));
            self.headers.push_back(header);
            accepted += 1;
        }
        while self.headers.len() > self.header_tail_len {
            self.headers.pop_front();
        }
        accepted
    }

    /// Returns true if a header filled `slot` of round `round_index`.
    pub fn is_slot_filled(&self, round_index: u64, slot: u32) -> bool {
        self.filled_slots.contains(&(round_index, slot))
    }

    /// Makes `round` current and forgets filled slots of earlier rounds.
    pub fn install_round(&mut self, round: Round) {
        let index = round.index;
        self.filled_slots.retain(|(r, _)| *r >= index);
        self.round = Some(round);
    }

    /// Forgets the header tail and every filled slot.
    pub fn clear_headers(&mut self) {
        self.headers.clear();
        self.filled_slots.clear();
    }

    pub fn agent(&self, agent_hash: &TxHash) -> Option<&Agent> {
        self.agents.iter().find(|a| &a.agent_hash == agent_hash)
    }

    /// Looks up an agent among active and exiting agents.
    pub fn live_agent(&self, agent_hash: &TxHash) -> Option<&Agent> {
        self.agent(agent_hash)
            .or_else(|| self.pending_exits.iter().find(|a| &a.agent_hash == agent_hash))
    }

    /// The end of the red-card lock on `address`, if it is still locked at `time`.
    pub fn locked_until(&self, address: &Address, time: u64) -> Option<u64> {
        self.locks.get(address).copied().filter(|until| time < *until)
    }

    pub fn deposit(&self, tx_hash: &TxHash) -> Option<&Deposit> {
        self.deposits.iter().find(|d| &d.tx_hash == tx_hash)
    }

    pub fn punish_history(&self, agent_hash: &TxHash) -> &[PunishRecord] {
        self.punishes
            .get(agent_hash)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Drops every cached record. The round is kept so a reload can be compared against it.
    pub fn clear_caches(&mut self) {
        self.agents.clear();
        self.pending_exits.clear();
        self.deposits.clear();
        self.locks.clear();
        self.punishes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poc_types::config::ConsensusConfig;

    fn header(height: u64) -> BlockHeaderSummary {
        BlockHeaderSummary {
            height,
            time: height * 10,
            packing_address: Address::default(),
            round_index: 1,
            round_start_time: 0,
            slot: 0,
        }
    }

    #[test]
    fn header_tail_is_bounded_and_monotonic() {
        let config = Arc::new(ChainConfig::from_defaults(&ConsensusConfig::default()));
        let mut state = ChainState::new(config, 3);
        assert_eq!(state.push_headers((1..=5).map(header)), 5);
        assert_eq!(state.headers.len(), 3);
        assert_eq!(state.last_height(), 5);

        // Stale and repeated heights are ignored.
        assert_eq!(state.push_headers([header(4), header(5), header(6)]), 1);
        let heights: Vec<u64> = state.headers.iter().map(|h| h.height).collect();
        assert_eq!(heights, vec![4, 5, 6]);
    }

    #[test]
    fn filled_slots_outlive_the_tail_until_the_round_moves_on() {
        let config = Arc::new(ChainConfig::from_defaults(&ConsensusConfig::default()));
        let mut state = ChainState::new(config, 2);
        let slots = (0..4u32).map(|slot| BlockHeaderSummary {
            slot,
            ..header(u64::from(slot) + 1)
        });
        state.push_headers(slots);
        assert_eq!(state.headers.len(), 2);
        assert!((0..4).all(|slot| state.is_slot_filled(1, slot)));

        state.install_round(Round {
            index: 2,
            start_time: 0,
            packing_interval: 10,
            members: vec![],
            position: 0,
        });
        assert!(state.filled_slots.is_empty());
    }
}
