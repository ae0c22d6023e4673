use log::info;
use radiotation_core::{Room, RoomId, RotatorKind, Track, TrackEntry, User, UserId};

use crate::{CollabContext, CollabError, CollabEvent, Database, DatabaseError, NewRoom};

type Result<T> = std::result::Result<T, CollabError>;

pub struct RoomManager<Db> {
    context: CollabContext<Db>,
}

/// The outcome of a successful veto
#[derive(Debug, Clone)]
pub struct Veto {
    /// The history entry that was vetoed
    pub vetoed: TrackEntry,
    /// Whose track plays instead
    pub user: User,
    pub track: Track,
}

impl<Db> RoomManager<Db>
where
    Db: Database,
{
    pub fn new(context: &CollabContext<Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Creates a new room
    pub async fn create(&self, display_name: &str, rotator: RotatorKind) -> Result<Room> {
        let room = self
            .context
            .database
            .create_room(NewRoom {
                display_name: display_name.to_string(),
                rotator,
            })
            .await?;

        Ok(room)
    }

    pub async fn get(&self, room_id: &RoomId) -> Result<Room> {
        Ok(self.context.database.room(room_id).await?)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Room>> {
        Ok(self.context.database.search_rooms(query).await?)
    }

    /// Members of a room, in the order they joined
    pub async fn members(&self, room_id: &RoomId) -> Result<Vec<User>> {
        Ok(self.context.database.members(room_id).await?)
    }

    pub async fn history(&self, room_id: &RoomId) -> Result<Vec<TrackEntry>> {
        Ok(self.context.database.history(room_id).await?)
    }

    /// Makes a user a member of the room, giving them a queue and a place in the rotation.
    pub async fn join(&self, room_id: &RoomId, user_id: &UserId) -> Result<User> {
        let database = &self.context.database;

        database.add_user_to_room(room_id, user_id).await?;
        let user = database.user(user_id).await?;

        info!("{} joined room {}", user.display_name, room_id);

        self.context.emit(CollabEvent::UserJoined {
            room_id: room_id.clone(),
            user: user.clone(),
        });

        Ok(user)
    }

    /// Serves the next track of the room and tells everyone in it.
    pub async fn next_track(&self, room_id: &RoomId) -> Result<(User, Track)> {
        let (user, track) = self.context.database.next_track(room_id).await?;

        info!(
            "Now playing {} from {} in room {}",
            track.name, user.display_name, room_id
        );

        self.context.emit(CollabEvent::NowPlaying {
            room_id: room_id.clone(),
            user: user.clone(),
            track: track.clone(),
        });

        Ok((user, track))
    }

    /// Vetoes the playing track and serves a replacement.
    ///
    /// The veto is kept even when there is nothing to replace the track with,
    /// in which case [CollabError::NoTracksLeft] is returned.
    ///
    /// Marking the veto and serving the replacement are two separate writes,
    /// so a concurrent [RoomManager::next_track] may serve a track in between.
    pub async fn veto(&self, room_id: &RoomId, user_id: &UserId) -> Result<Veto> {
        let vetoed = self.context.database.mark_vetoed(room_id, user_id).await?;

        info!(
            "{} vetoed {} in room {}",
            user_id, vetoed.track.name, room_id
        );

        self.context.emit(CollabEvent::Vetoed {
            room_id: room_id.clone(),
            vetoed_by: user_id.clone(),
            entry: vetoed.clone(),
        });

        match self.next_track(room_id).await {
            Ok((user, track)) => Ok(Veto {
                vetoed,
                user,
                track,
            }),
            Err(CollabError::Database(DatabaseError::Exhausted)) => Err(CollabError::NoTracksLeft),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use crossbeam::channel::{unbounded, Receiver, Sender};
    use radiotation_core::{Config, QueueFilter, QueueId, TrackId};

    use super::*;
    use crate::{Catalog, Collab, Hub, MemoryDatabase, SongError};

    struct RecordingHub(Sender<(RoomId, serde_json::Value)>);

    impl Hub for RecordingHub {
        fn broadcast_room(&self, room_id: &RoomId, payload: Vec<u8>) {
            let event = serde_json::from_slice(&payload).expect("payload is json");
            let _ = self.0.send((room_id.clone(), event));
        }
    }

    fn collab() -> (Collab<MemoryDatabase>, Receiver<(RoomId, serde_json::Value)>) {
        let tracks = (1..=4)
            .map(|i| Track::new(format!("t{}", i), format!("Track {}", i)))
            .collect();

        let (sender, receiver) = unbounded();
        let collab = Collab::new(
            Config::default(),
            MemoryDatabase::new(Config::default()),
            Catalog::new(tracks),
            RecordingHub(sender),
        );

        (collab, receiver)
    }

    async fn room_with_members(collab: &Collab<MemoryDatabase>, names: &[&str]) -> Room {
        let room = collab
            .rooms
            .create("Test Room", RotatorKind::RoundRobin)
            .await
            .unwrap();

        for name in names {
            collab
                .users
                .register(UserId::new(*name), name)
                .await
                .unwrap();
            collab
                .rooms
                .join(&room.id, &UserId::new(*name))
                .await
                .unwrap();
        }

        room
    }

    #[tokio::test]
    async fn test_veto_serves_replacement() {
        let (collab, events) = collab();
        let room = room_with_members(&collab, &["a", "b"]).await;

        let a = QueueId::new(&room.id, &UserId::new("a"));
        let b = QueueId::new(&room.id, &UserId::new("b"));

        for (queue_id, track) in [(&a, "t1"), (&b, "t3")] {
            collab
                .queues
                .add(queue_id, &TrackId::new(track), None)
                .await
                .unwrap();
        }

        let (user, track) = collab.rooms.next_track(&room.id).await.unwrap();
        assert_eq!(user.id, UserId::new("a"));
        assert_eq!(track.id, TrackId::new("t1"));

        let veto = collab
            .rooms
            .veto(&room.id, &UserId::new("b"))
            .await
            .unwrap();
        assert_eq!(veto.vetoed.track.id, TrackId::new("t1"));
        assert_eq!(veto.vetoed.vetoed_by, Some(UserId::new("b")));
        assert_eq!(
            veto.user.id,
            UserId::new("b"),
            "the next member's track replaces it"
        );
        assert_eq!(veto.track.id, TrackId::new("t3"));

        let history = collab.rooms.history(&room.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].vetoed);
        assert!(!history[1].vetoed);

        collab.shutdown().await;

        let kinds: Vec<_> = events
            .try_iter()
            .map(|(room_id, event)| {
                assert_eq!(room_id, room.id, "events go to the room they happened in");
                event["type"].as_str().unwrap_or_default().to_string()
            })
            .collect();

        assert_eq!(
            kinds,
            [
                "user_joined",
                "user_joined",
                "queue_updated",
                "queue_updated",
                "now_playing",
                "vetoed",
                "now_playing"
            ]
        );
    }

    #[tokio::test]
    async fn test_veto_without_replacement_is_kept() {
        let (collab, _events) = collab();
        let room = room_with_members(&collab, &["a"]).await;
        let a = QueueId::new(&room.id, &UserId::new("a"));

        collab
            .queues
            .add(&a, &TrackId::new("t2"), None)
            .await
            .unwrap();
        collab.rooms.next_track(&room.id).await.unwrap();

        let result = collab.rooms.veto(&room.id, &UserId::new("a")).await;
        assert!(matches!(result, Err(CollabError::NoTracksLeft)));

        let history = collab.rooms.history(&room.id).await.unwrap();
        assert!(history[0].vetoed, "the veto should stick");

        let played = collab
            .queues
            .list(&a, QueueFilter::PlayedOnly)
            .await
            .unwrap();
        assert_eq!(played.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_track_is_rejected() {
        let (collab, _events) = collab();
        let room = room_with_members(&collab, &["a"]).await;
        let a = QueueId::new(&room.id, &UserId::new("a"));

        let result = collab.queues.add(&a, &TrackId::new("nope"), None).await;

        assert!(matches!(
            result,
            Err(CollabError::Song(SongError::NotFound(_)))
        ));
        assert!(collab
            .queues
            .list(&a, QueueFilter::All)
            .await
            .unwrap()
            .is_empty());
    }
}
