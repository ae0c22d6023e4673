use log::debug;
use radiotation_core::RoomId;

/// Delivers payloads to everyone listening in a room.
/// Delivery is fire-and-forget, nothing waits for it.
pub trait Hub: Send + Sync {
    fn broadcast_room(&self, room_id: &RoomId, payload: Vec<u8>);
}

/// A hub without listeners, it only logs what it would send.
pub struct LogHub;

impl Hub for LogHub {
    fn broadcast_room(&self, room_id: &RoomId, payload: Vec<u8>) {
        debug!(
            "Broadcast to room {}: {}",
            room_id,
            String::from_utf8_lossy(&payload)
        );
    }
}
