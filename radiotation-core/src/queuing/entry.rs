use serde::Serialize;

use crate::{Id, Track, TrackId};

pub type EntryId = Id<QueueEntry>;

/// A node in a member's queue. Neighbours are referenced by id, never by pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub id: EntryId,
    pub track_id: TrackId,
    pub played: bool,
    pub previous: Option<EntryId>,
    pub next: Option<EntryId>,
}

/// A queue entry together with the track it refers to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueTrack {
    pub id: EntryId,
    pub played: bool,
    pub track: Track,
}
