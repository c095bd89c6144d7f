//! Seeded randomness for reproducible property-style tests

use poc_types::app::{Address, Agent, TxHash};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::fixtures;

/// A deterministic RNG for `seed`.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// `count` active agents with random addresses and credits drawn from a small
/// range, so equal credits (and the address tie-break) are common.
pub fn random_agents(rng: &mut StdRng, count: usize) -> Vec<Agent> {
    (0..count)
        .map(|i| {
            let mut a = fixtures::agent(0, 0, 0);
            a.agent_hash = TxHash(rng.gen());
            a.agent_address = Address(rng.gen());
            a.packing_address = Address(rng.gen());
            a.deposit = 100 + (i as u128 % 7);
            a.credit = rng.gen_range(1..=5u128) * 10;
            a
        })
        .collect()
}

/// Returns a shuffled copy of `items`.
pub fn shuffled<T: Clone>(rng: &mut StdRng, items: &[T]) -> Vec<T> {
    let mut out = items.to_vec();
    out.shuffle(rng);
    out
}
