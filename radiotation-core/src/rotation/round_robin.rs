use serde::{Deserialize, Serialize};

use super::{halfway_slot, Rotate};

/// Serves members in a fixed order, one after another.
///
/// Newcomers are placed halfway between the cursor and the end of the order,
/// so they get a turn soon without restarting the rotation for everyone else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundRobin {
    order: Vec<usize>,
    cursor: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// The order members are visited in, starting from the beginning of the rotation
    pub fn order(&self) -> &[usize] {
        &self.order
    }
}

impl Rotate for RoundRobin {
    fn next_index(&mut self) -> usize {
        if self.order.is_empty() {
            return 0;
        }

        let index = self.order[self.cursor];
        self.cursor = (self.cursor + 1) % self.order.len();

        index
    }

    fn add(&mut self) {
        let len = self.order.len();
        let slot = halfway_slot(self.cursor, len);

        self.order.insert(slot, len);

        // Keep pointing at the same member
        if slot < self.cursor {
            self.cursor += 1;
        }
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}
