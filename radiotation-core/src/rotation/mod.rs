mod random;
mod round_robin;
mod shuffle;

use std::fmt::Display;
use std::str::FromStr;

use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use random::*;
pub use round_robin::*;
pub use shuffle::*;

/// Decides whose turn is next in an index space that only ever grows.
pub trait Rotate {
    /// Returns the index whose turn it is and advances the rotation.
    /// An empty index space always yields 0.
    fn next_index(&mut self) -> usize;

    /// Grows the index space by one, placing the newcomer somewhere in the rotation.
    fn add(&mut self);

    /// The size of the index space.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("Rotator picked index {index}, but the room only has {members} members")]
    IndexOutOfRange { index: usize, members: usize },
    #[error("\"{0}\" is not a rotator, expected round-robin, shuffle or random")]
    UnknownKind(String),
    #[error("Rotator state is unreadable: {0}")]
    State(#[from] serde_json::Error),
}

/// The rotation strategy of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotatorKind {
    /// Members take turns in a fixed order
    RoundRobin,
    /// Every member plays once per round, in a new random order each round
    Shuffle,
    /// Every turn goes to a random member
    Random,
}

impl RotatorKind {
    /// The key the kind is stored under
    pub fn as_str(&self) -> &'static str {
        match self {
            RotatorKind::RoundRobin => "round_robin",
            RotatorKind::Shuffle => "shuffle",
            RotatorKind::Random => "random",
        }
    }
}

impl Display for RotatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RotatorKind::RoundRobin => "Round Robin",
            RotatorKind::Shuffle => "Shuffle",
            RotatorKind::Random => "Random",
        };

        f.write_str(name)
    }
}

impl FromStr for RotatorKind {
    type Err = RotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "round_robin" | "roundrobin" => Ok(Self::RoundRobin),
            "shuffle" => Ok(Self::Shuffle),
            "random" => Ok(Self::Random),
            _ => Err(RotationError::UnknownKind(s.to_string())),
        }
    }
}

/// The rotator of a room, tagged by kind so it can be stored as a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rotator {
    RoundRobin(RoundRobin),
    Shuffle(Shuffle),
    Random(Random),
}

impl Rotator {
    /// Creates an empty rotator with a fresh seed.
    pub fn new(kind: RotatorKind) -> Self {
        Self::with_seed(kind, thread_rng().gen())
    }

    /// Creates an empty rotator whose random choices are fully determined by `seed`.
    pub fn with_seed(kind: RotatorKind, seed: u64) -> Self {
        match kind {
            RotatorKind::RoundRobin => Self::RoundRobin(RoundRobin::new()),
            RotatorKind::Shuffle => Self::Shuffle(Shuffle::new(seed)),
            RotatorKind::Random => Self::Random(Random::new(seed)),
        }
    }

    pub fn kind(&self) -> RotatorKind {
        match self {
            Rotator::RoundRobin(_) => RotatorKind::RoundRobin,
            Rotator::Shuffle(_) => RotatorKind::Shuffle,
            Rotator::Random(_) => RotatorKind::Random,
        }
    }

    /// Serializes the full state, so a decoded rotator continues exactly where this one is.
    pub fn encode(&self) -> Result<String, RotationError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(state: &str) -> Result<Self, RotationError> {
        Ok(serde_json::from_str(state)?)
    }

    fn inner(&self) -> &dyn Rotate {
        match self {
            Rotator::RoundRobin(r) => r,
            Rotator::Shuffle(r) => r,
            Rotator::Random(r) => r,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Rotate {
        match self {
            Rotator::RoundRobin(r) => r,
            Rotator::Shuffle(r) => r,
            Rotator::Random(r) => r,
        }
    }
}

impl Rotate for Rotator {
    fn next_index(&mut self) -> usize {
        self.inner_mut().next_index()
    }

    fn add(&mut self) {
        self.inner_mut().add()
    }

    fn len(&self) -> usize {
        self.inner().len()
    }
}

/// Finds the next member that has something to serve.
///
/// `candidates` holds one slot per member in join order. The rotator is asked
/// at most once per member, so the search ends even when nobody has anything
/// queued. A member without a candidate simply loses this turn.
pub fn next_turn<R, T>(
    rotator: &mut R,
    candidates: &[Option<T>],
) -> Result<Option<usize>, RotationError>
where
    R: Rotate + ?Sized,
{
    for _ in 0..candidates.len() {
        let index = rotator.next_index();

        let candidate = candidates
            .get(index)
            .ok_or(RotationError::IndexOutOfRange {
                index,
                members: candidates.len(),
            })?;

        if candidate.is_some() {
            return Ok(Some(index));
        }
    }

    Ok(None)
}

/// Where a newcomer lands: roughly halfway between the cursor and the end of the rotation.
pub(crate) fn halfway_slot(cursor: usize, len: usize) -> usize {
    (cursor + (len + 1) / 2) % (len + 1)
}
