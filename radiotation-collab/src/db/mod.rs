use async_trait::async_trait;
use radiotation_core::{
    EntryId, QueueError, QueueFilter, QueueId, QueueTrack, Room, RoomId, RotationError, Track,
    TrackEntry, User, UserId, VetoError,
};
use thiserror::Error;

mod data;
pub use data::*;

mod writer;
pub use writer::*;

mod schema;

mod sqlite;
pub use sqlite::*;

mod memory;
pub use memory::*;

#[cfg(test)]
mod tests;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// The request clashes with the current state
    #[error("{resource} conflict: {reason}")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        reason: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    /// Nobody in the room has anything left to play
    #[error("No tracks in room")]
    Exhausted,
    /// Stored state contradicts itself, which means there is a bug somewhere
    #[error("Integrity violation: {0}")]
    Integrity(String),
    /// The writer task is gone, so nothing can be changed anymore
    #[error("The database writer has shut down")]
    WriterClosed,
}

impl DatabaseError {
    pub fn not_found(resource: &'static str, identifier: impl ToString) -> Self {
        Self::NotFound {
            resource,
            identifier: identifier.to_string(),
        }
    }

    pub fn conflict(resource: &'static str, reason: impl ToString) -> Self {
        Self::Conflict {
            resource,
            reason: reason.to_string(),
        }
    }
}

impl From<QueueError> for DatabaseError {
    fn from(error: QueueError) -> Self {
        match error {
            QueueError::EntryNotFound(id) => Self::not_found("queue entry", id),
            QueueError::Corrupt(reason) => Self::Integrity(reason),
            e => Self::conflict("queue entry", e),
        }
    }
}

impl From<RotationError> for DatabaseError {
    fn from(error: RotationError) -> Self {
        Self::Integrity(error.to_string())
    }
}

impl From<VetoError> for DatabaseError {
    fn from(error: VetoError) -> Self {
        Self::conflict("veto", error)
    }
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: impl ToString) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

impl IntoDatabaseError for sqlx::Error {
    fn not_found_or(self, resource: &'static str, identifier: impl ToString) -> DatabaseError {
        match self {
            sqlx::Error::RowNotFound => DatabaseError::not_found(resource, identifier),
            e => e.any(),
        }
    }

    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, reason: impl ToString) -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(self, resource: &'static str, reason: impl ToString) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::conflict(resource, reason)),
            Err(DatabaseError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Represents a type that can store rooms, queues and what played in them.
///
/// Every mutating operation is atomic: it either applies fully or leaves
/// the store untouched.
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn room(&self, room_id: &RoomId) -> Result<Room>;
    /// Rooms whose normalized name contains the normalized query.
    /// An empty query matches nothing.
    async fn search_rooms(&self, query: &str) -> Result<Vec<Room>>;
    /// Claims a free room code and creates the room with an empty rotator.
    async fn create_room(&self, new_room: NewRoom) -> Result<Room>;
    /// Adds a member to the room, growing its rotator by one.
    async fn add_user_to_room(&self, room_id: &RoomId, user_id: &UserId) -> Result<()>;
    /// Members of the room in join order
    async fn members(&self, room_id: &RoomId) -> Result<Vec<User>>;

    async fn user(&self, user_id: &UserId) -> Result<User>;
    async fn create_user(&self, new_user: NewUser) -> Result<User>;

    /// Lists a member's queue in order.
    async fn tracks(&self, queue_id: &QueueId, filter: QueueFilter) -> Result<Vec<QueueTrack>>;
    /// Inserts a track after `after`, or at the head of the queue.
    async fn add_track(
        &self,
        queue_id: &QueueId,
        track: Track,
        after: Option<EntryId>,
    ) -> Result<EntryId>;
    async fn remove_track(&self, queue_id: &QueueId, entry_id: &EntryId) -> Result<()>;
    /// Serves the next track of the room and records it in the history.
    async fn next_track(&self, room_id: &RoomId) -> Result<(User, Track)>;

    /// Everything that was served in the room, oldest first
    async fn history(&self, room_id: &RoomId) -> Result<Vec<TrackEntry>>;
    /// Flags the most recently served track as vetoed by `user_id`.
    async fn mark_vetoed(&self, room_id: &RoomId, user_id: &UserId) -> Result<TrackEntry>;

    /// Finishes pending work and releases the store.
    async fn close(&self) {}
}
