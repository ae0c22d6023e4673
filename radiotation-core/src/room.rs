use serde::{Deserialize, Serialize};

use crate::{Id, RotatorKind};

pub type RoomId = Id<Room>;
pub type UserId = Id<User>;

/// A room members take turns playing music in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub display_name: String,
    pub rotator: RotatorKind,
}

/// A radiotation account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
}

/// Identifies the queue a member has in a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QueueId {
    pub room_id: RoomId,
    pub user_id: UserId,
}

impl QueueId {
    pub fn new(room_id: &RoomId, user_id: &UserId) -> Self {
        Self {
            room_id: room_id.clone(),
            user_id: user_id.clone(),
        }
    }
}
