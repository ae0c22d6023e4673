mod db;
mod events;
mod hub;
mod queues;
mod rooms;
mod songs;
mod users;
mod util;

use std::{sync::Arc, thread::JoinHandle};

use crossbeam::channel::unbounded;
use log::warn;
use radiotation_core::Config;
use thiserror::Error;

pub use db::*;
pub use events::*;
pub use hub::*;
pub use queues::*;
pub use rooms::*;
pub use songs::*;
pub use users::*;
pub use util::*;

/// The radiotation collab system, facilitating rooms, queues and the people in them.
pub struct Collab<Db> {
    context: CollabContext<Db>,
    dispatcher: Option<JoinHandle<()>>,

    pub rooms: RoomManager<Db>,
    pub queues: QueueManager<Db>,
    pub users: UserManager<Db>,
}

/// A type passed to the managers of the collab system, to access state and emit events.
pub struct CollabContext<Db> {
    pub config: Config,
    pub database: Arc<Db>,
    pub songs: Arc<dyn SongServer>,

    event_sender: EventSender,
}

#[derive(Debug, Error)]
pub enum CollabError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Song(#[from] SongError),
    /// A veto went through, but nobody had anything to play instead
    #[error("No tracks left in queue")]
    NoTracksLeft,
}

impl<Db> Collab<Db>
where
    Db: Database,
{
    pub fn new<S, H>(config: Config, database: Db, songs: S, hub: H) -> Self
    where
        S: SongServer + 'static,
        H: Hub + 'static,
    {
        let (event_sender, event_receiver) = unbounded();
        let dispatcher = events::spawn_event_dispatch_thread(event_receiver, Arc::new(hub));

        let context = CollabContext {
            config,
            database: Arc::new(database),
            songs: Arc::new(songs),
            event_sender,
        };

        Self {
            rooms: RoomManager::new(&context),
            queues: QueueManager::new(&context),
            users: UserManager::new(&context),
            dispatcher,
            context,
        }
    }

    /// Closes the database and waits until every pending event reached the hub.
    pub async fn shutdown(self) {
        self.context.database.close().await;

        let Collab {
            context,
            dispatcher,
            rooms,
            queues,
            users,
        } = self;

        // The dispatcher stops once every sender is dropped
        drop((context, rooms, queues, users));

        if let Some(dispatcher) = dispatcher {
            if dispatcher.join().is_err() {
                warn!("Event dispatch thread panicked");
            }
        }
    }
}

impl<Db> CollabContext<Db> {
    pub fn emit(&self, event: CollabEvent) {
        if let Err(e) = self.event_sender.send(event) {
            warn!("Event dropped, dispatch has stopped: {:?}", e.into_inner());
        }
    }
}

impl<Db> Clone for CollabContext<Db> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            database: self.database.clone(),
            songs: self.songs.clone(),
            event_sender: self.event_sender.clone(),
        }
    }
}
