mod entry;
mod queue;

pub use entry::*;
pub use queue::*;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue entry {0} doesn't exist")]
    EntryNotFound(EntryId),
    #[error("Tracks can't be added before {0}, it has already been played")]
    InsertBeforePlayed(EntryId),
    #[error("Queue entry {0} has already been played and can't be removed")]
    RemovePlayed(EntryId),
    #[error("Queue entry {0} already exists")]
    DuplicateEntry(EntryId),
    #[error("Queue is corrupt: {0}")]
    Corrupt(String),
}

/// Which entries of a queue to list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueueFilter {
    #[default]
    All,
    PlayedOnly,
    UnplayedOnly,
}

impl QueueFilter {
    pub fn matches(&self, played: bool) -> bool {
        match self {
            QueueFilter::All => true,
            QueueFilter::PlayedOnly => played,
            QueueFilter::UnplayedOnly => !played,
        }
    }
}
