use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::Rotate;

/// Hands every turn to a random member. Repeats are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Random {
    len: usize,
    seed: u64,
    draws: u64,
}

impl Random {
    pub fn new(seed: u64) -> Self {
        Self {
            len: 0,
            seed,
            draws: 0,
        }
    }
}

impl Rotate for Random {
    fn next_index(&mut self) -> usize {
        if self.len == 0 {
            return 0;
        }

        // Derived from the draw count so a stored rotator picks up where it left off
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(self.draws));
        self.draws += 1;

        rng.gen_range(0..self.len)
    }

    fn add(&mut self) {
        self.len += 1;
    }

    fn len(&self) -> usize {
        self.len
    }
}
