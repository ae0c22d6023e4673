use std::collections::HashMap;

use async_trait::async_trait;
use log::{error, info};
use parking_lot::Mutex;
use radiotation_core::{
    next_turn, veto_target, Config, EntryId, Queue, QueueFilter, QueueId, QueueTrack, Room, RoomId,
    Rotate, Rotator, Track, TrackEntry, TrackId, User, UserId,
};

use crate::normalize_name;

use super::{Database, DatabaseError, NewRoom, NewUser, Result};

/// A database that only lives as long as the process.
/// Every operation holds one lock for its whole duration.
pub struct MemoryDatabase {
    state: Mutex<State>,
    config: Config,
}

#[derive(Default)]
struct State {
    rooms: HashMap<RoomId, RoomState>,
    users: HashMap<UserId, User>,
    queues: HashMap<QueueId, Queue>,
    tracks: HashMap<TrackId, Track>,
}

struct RoomState {
    room: Room,
    rotator: Rotator,
    /// In join order
    members: Vec<UserId>,
    history: Vec<TrackEntry>,
}

impl MemoryDatabase {
    pub fn new(config: Config) -> Self {
        Self {
            state: Default::default(),
            config,
        }
    }
}

impl State {
    fn room(&self, room_id: &RoomId) -> Result<&RoomState> {
        self.rooms
            .get(room_id)
            .ok_or_else(|| DatabaseError::not_found("room", room_id))
    }

    fn user(&self, user_id: &UserId) -> Result<&User> {
        self.users
            .get(user_id)
            .ok_or_else(|| DatabaseError::not_found("user", user_id))
    }

    fn queue(&self, queue_id: &QueueId) -> Result<&Queue> {
        self.queues
            .get(queue_id)
            .ok_or_else(|| queue_not_found(queue_id))
    }
}

fn queue_not_found(queue_id: &QueueId) -> DatabaseError {
    DatabaseError::not_found(
        "queue",
        format!("{}/{}", queue_id.room_id, queue_id.user_id),
    )
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn room(&self, room_id: &RoomId) -> Result<Room> {
        Ok(self.state.lock().room(room_id)?.room.clone())
    }

    async fn search_rooms(&self, query: &str) -> Result<Vec<Room>> {
        let query = normalize_name(query);

        if query.is_empty() {
            return Ok(vec![]);
        }

        let mut rooms: Vec<_> = self
            .state
            .lock()
            .rooms
            .values()
            .filter(|r| normalize_name(&r.room.display_name).contains(&query))
            .map(|r| r.room.clone())
            .collect();

        rooms.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(rooms)
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<Room> {
        let mut state = self.state.lock();

        let room_id = (0..self.config.room_code_attempts)
            .map(|_| RoomId::code(self.config.room_code_length))
            .find(|id| !state.rooms.contains_key(id))
            .ok_or_else(|| {
                DatabaseError::conflict(
                    "room",
                    format!(
                        "no free room code after {} attempts",
                        self.config.room_code_attempts
                    ),
                )
            })?;

        let room = Room {
            id: room_id.clone(),
            display_name: new_room.display_name,
            rotator: new_room.rotator,
        };

        state.rooms.insert(
            room_id,
            RoomState {
                room: room.clone(),
                rotator: Rotator::new(new_room.rotator),
                members: vec![],
                history: vec![],
            },
        );

        info!("Created room {} ({})", room.id, room.display_name);
        Ok(room)
    }

    async fn add_user_to_room(&self, room_id: &RoomId, user_id: &UserId) -> Result<()> {
        let mut state = self.state.lock();
        let queue_id = QueueId::new(room_id, user_id);

        state.room(room_id)?;
        state.user(user_id)?;

        if state.queues.contains_key(&queue_id) {
            return Err(DatabaseError::conflict(
                "membership",
                format!("{} is already in room {}", user_id, room_id),
            ));
        }

        state.queues.insert(queue_id, Queue::new());

        if let Some(room) = state.rooms.get_mut(room_id) {
            room.members.push(user_id.clone());
            room.rotator.add();
        }

        Ok(())
    }

    async fn members(&self, room_id: &RoomId) -> Result<Vec<User>> {
        let state = self.state.lock();

        state
            .room(room_id)?
            .members
            .iter()
            .map(|id| state.user(id).cloned())
            .collect()
    }

    async fn user(&self, user_id: &UserId) -> Result<User> {
        self.state.lock().user(user_id).cloned()
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let mut state = self.state.lock();

        if state.users.contains_key(&new_user.id) {
            return Err(DatabaseError::conflict(
                "user",
                format!("{} already exists", new_user.id),
            ));
        }

        let user = User {
            id: new_user.id,
            display_name: new_user.display_name,
        };

        state.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn tracks(&self, queue_id: &QueueId, filter: QueueFilter) -> Result<Vec<QueueTrack>> {
        let state = self.state.lock();

        state
            .queue(queue_id)?
            .entries(filter)
            .into_iter()
            .map(|entry| {
                let track = state.tracks.get(&entry.track_id).cloned().ok_or_else(|| {
                    DatabaseError::Integrity(format!("track {} is missing", entry.track_id))
                })?;

                Ok(QueueTrack {
                    id: entry.id.clone(),
                    played: entry.played,
                    track,
                })
            })
            .collect()
    }

    async fn add_track(
        &self,
        queue_id: &QueueId,
        track: Track,
        after: Option<EntryId>,
    ) -> Result<EntryId> {
        let mut state = self.state.lock();
        let State { queues, tracks, .. } = &mut *state;

        let queue = queues
            .get_mut(queue_id)
            .ok_or_else(|| queue_not_found(queue_id))?;

        let id = EntryId::random(self.config.entry_id_length);
        queue.insert_after(after.as_ref(), id.clone(), track.id.clone())?;

        tracks.insert(track.id.clone(), track);
        Ok(id)
    }

    async fn remove_track(&self, queue_id: &QueueId, entry_id: &EntryId) -> Result<()> {
        let mut state = self.state.lock();

        state
            .queues
            .get_mut(queue_id)
            .ok_or_else(|| queue_not_found(queue_id))?
            .remove(entry_id)?;

        Ok(())
    }

    async fn next_track(&self, room_id: &RoomId) -> Result<(User, Track)> {
        let mut state = self.state.lock();
        let State {
            rooms,
            users,
            queues,
            tracks,
        } = &mut *state;

        let room = rooms
            .get_mut(room_id)
            .ok_or_else(|| DatabaseError::not_found("room", room_id))?;

        let candidates: Vec<_> = room
            .members
            .iter()
            .map(|u| {
                queues
                    .get(&QueueId::new(room_id, u))
                    .and_then(|q| q.next_to_serve())
            })
            .collect();

        // Work on a copy so nothing moves unless a track is served
        let mut rotator = room.rotator.clone();

        let index = match next_turn(&mut rotator, &candidates) {
            Ok(Some(index)) => index,
            Ok(None) => return Err(DatabaseError::Exhausted),
            Err(e) => {
                error!(
                    "Rotator of room {} is out of sync with its members: {}",
                    room_id, e
                );
                return Err(e.into());
            }
        };

        let user_id = room.members[index].clone();
        let queue_id = QueueId::new(room_id, &user_id);

        let user = users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| DatabaseError::Integrity(format!("member {} is missing", user_id)))?;

        let queue = queues
            .get_mut(&queue_id)
            .ok_or_else(|| queue_not_found(&queue_id))?;

        let track = queue
            .next_to_serve()
            .and_then(|e| tracks.get(&e.track_id))
            .cloned()
            .ok_or_else(|| {
                DatabaseError::Integrity(format!("next track of {} is missing", user_id))
            })?;

        queue.take_next();
        room.rotator = rotator;
        room.history.push(TrackEntry::new(user_id, track.clone()));

        Ok((user, track))
    }

    async fn history(&self, room_id: &RoomId) -> Result<Vec<TrackEntry>> {
        Ok(self.state.lock().room(room_id)?.history.clone())
    }

    async fn mark_vetoed(&self, room_id: &RoomId, user_id: &UserId) -> Result<TrackEntry> {
        let mut state = self.state.lock();

        state.queue(&QueueId::new(room_id, user_id))?;

        let room = state
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| DatabaseError::not_found("room", room_id))?;

        let cooldown = self.config.veto_cooldown(room.members.len());
        let position = veto_target(&room.history, user_id, cooldown)?;

        let entry = &mut room.history[position];
        entry.vetoed = true;
        entry.vetoed_by = Some(user_id.clone());

        Ok(entry.clone())
    }
}

#[cfg(test)]
mod test {
    use radiotation_core::RotatorKind;

    use super::*;

    async fn room_with(db: &MemoryDatabase, kind: RotatorKind, members: &[&str]) -> RoomId {
        let room = db
            .create_room(NewRoom {
                display_name: "Rollback".to_string(),
                rotator: kind,
            })
            .await
            .unwrap();

        for id in members {
            let user = db
                .create_user(NewUser {
                    id: UserId::new(*id),
                    display_name: id.to_string(),
                })
                .await
                .unwrap();

            db.add_user_to_room(&room.id, &user.id).await.unwrap();
        }

        room.id
    }

    fn rotator(db: &MemoryDatabase, room_id: &RoomId) -> Rotator {
        db.state.lock().rooms[room_id].rotator.clone()
    }

    #[tokio::test]
    async fn test_exhausted_room_keeps_rotator() {
        let db = MemoryDatabase::new(Config::default());
        let room_id = room_with(&db, RotatorKind::Shuffle, &["a", "b"]).await;

        let before = rotator(&db, &room_id);

        for _ in 0..3 {
            assert!(matches!(
                db.next_track(&room_id).await,
                Err(DatabaseError::Exhausted)
            ));
        }

        assert_eq!(rotator(&db, &room_id), before);
    }

    #[tokio::test]
    async fn test_out_of_sync_rotator_changes_nothing() {
        let db = MemoryDatabase::new(Config::default());
        let room_id = room_with(&db, RotatorKind::RoundRobin, &["a"]).await;
        let queue_id = QueueId::new(&room_id, &UserId::new("a"));

        let entry_id = db
            .add_track(&queue_id, Track::new("t1", "One"), None)
            .await
            .unwrap();

        // Three slots for one member, with the cursor on a slot past the end
        let mut corrupt = Rotator::with_seed(RotatorKind::RoundRobin, 0);
        (0..3).for_each(|_| corrupt.add());
        corrupt.next_index();

        db.state.lock().rooms.get_mut(&room_id).unwrap().rotator = corrupt.clone();

        assert!(matches!(
            db.next_track(&room_id).await,
            Err(DatabaseError::Integrity(_))
        ));

        let state = db.state.lock();
        assert_eq!(state.rooms[&room_id].rotator, corrupt);
        assert!(state.rooms[&room_id].history.is_empty());

        let next = state.queue(&queue_id).unwrap().next_to_serve();
        assert_eq!(next.map(|e| &e.id), Some(&entry_id));
    }
}
