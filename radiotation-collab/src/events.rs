use std::{sync::Arc, thread};

use crossbeam::channel::{Receiver, Sender};
use log::{error, warn};
use radiotation_core::{RoomId, Track, TrackEntry, User, UserId};
use serde::Serialize;

use crate::Hub;

pub type EventSender = Sender<CollabEvent>;
pub type EventReceiver = Receiver<CollabEvent>;

/// Events broadcast to everyone in a room
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollabEvent {
    /// A track was served and is now playing
    NowPlaying {
        room_id: RoomId,
        user: User,
        track: Track,
    },
    /// The playing track was vetoed
    Vetoed {
        room_id: RoomId,
        vetoed_by: UserId,
        entry: TrackEntry,
    },
    /// User became a member of a room
    UserJoined { room_id: RoomId, user: User },
    /// A member's queue was modified
    QueueUpdated { room_id: RoomId, user_id: UserId },
}

impl CollabEvent {
    pub fn room_id(&self) -> &RoomId {
        match self {
            CollabEvent::NowPlaying { room_id, .. }
            | CollabEvent::Vetoed { room_id, .. }
            | CollabEvent::UserJoined { room_id, .. }
            | CollabEvent::QueueUpdated { room_id, .. } => room_id,
        }
    }
}

/// Forwards every event to the hub on a dedicated thread, until all senders are gone.
pub(crate) fn spawn_event_dispatch_thread(
    receiver: EventReceiver,
    hub: Arc<dyn Hub>,
) -> Option<thread::JoinHandle<()>> {
    let run = move || {
        for event in receiver {
            match serde_json::to_vec(&event) {
                Ok(payload) => hub.broadcast_room(event.room_id(), payload),
                Err(e) => warn!("Could not serialize {:?}: {}", event, e),
            }
        }
    };

    thread::Builder::new()
        .name("collab-events".to_string())
        .spawn(run)
        .map_err(|e| error!("Could not start event dispatch: {}", e))
        .ok()
}
