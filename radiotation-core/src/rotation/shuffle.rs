use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{halfway_slot, Rotate};

/// Serves every member once per round, in a new random order each round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shuffle {
    perm: Vec<usize>,
    cursor: usize,
    len: usize,
    seed: u64,
    /// How many permutations have been drawn so far
    epoch: u64,
    /// Newcomers whose slot in the current round was already passed,
    /// with the slot they take in the next one.
    deferred: Vec<(usize, usize)>,
}

impl Shuffle {
    pub fn new(seed: u64) -> Self {
        Self {
            perm: vec![],
            cursor: 0,
            len: 0,
            seed,
            epoch: 0,
            deferred: vec![],
        }
    }

    /// The permutation of the current round
    pub fn permutation(&self) -> &[usize] {
        &self.perm
    }

    fn reshuffle(&mut self) {
        let deferred = std::mem::take(&mut self.deferred);
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(self.epoch));

        let mut perm: Vec<_> = (0..self.len)
            .filter(|i| !deferred.iter().any(|(index, _)| index == i))
            .collect();

        perm.shuffle(&mut rng);

        for (index, slot) in deferred {
            let slot = slot.min(perm.len());
            perm.insert(slot, index);
        }

        self.perm = perm;
        self.cursor = 0;
        self.epoch += 1;
    }
}

impl Rotate for Shuffle {
    fn next_index(&mut self) -> usize {
        if self.len == 0 {
            return 0;
        }

        if self.epoch == 0 || self.cursor >= self.perm.len() {
            self.reshuffle();
        }

        let index = self.perm[self.cursor];
        self.cursor += 1;

        index
    }

    fn add(&mut self) {
        let index = self.len;
        self.len += 1;

        // The first draw covers everyone
        if self.epoch == 0 {
            return;
        }

        let slot = halfway_slot(self.cursor, self.perm.len());

        if slot >= self.cursor {
            self.perm.insert(slot, index);
        } else {
            self.deferred.push((index, slot));
        }
    }

    fn len(&self) -> usize {
        self.len
    }
}
