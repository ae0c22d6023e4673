use radiotation_core::{EntryId, QueueFilter, QueueId, QueueTrack, Track, TrackId};

use crate::{CollabContext, CollabError, CollabEvent, Database};

type Result<T> = std::result::Result<T, CollabError>;

/// Manages the queues members have in their rooms.
pub struct QueueManager<Db> {
    context: CollabContext<Db>,
}

impl<Db> QueueManager<Db>
where
    Db: Database,
{
    pub fn new(context: &CollabContext<Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Looks up a track in the catalog and adds it after `after`, or at the head of the queue.
    pub async fn add(
        &self,
        queue_id: &QueueId,
        track_id: &TrackId,
        after: Option<EntryId>,
    ) -> Result<EntryId> {
        let track = self.context.songs.track(track_id).await?;
        let entry_id = self
            .context
            .database
            .add_track(queue_id, track, after)
            .await?;

        self.notify(queue_id);
        Ok(entry_id)
    }

    pub async fn remove(&self, queue_id: &QueueId, entry_id: &EntryId) -> Result<()> {
        self.context
            .database
            .remove_track(queue_id, entry_id)
            .await?;

        self.notify(queue_id);
        Ok(())
    }

    pub async fn list(&self, queue_id: &QueueId, filter: QueueFilter) -> Result<Vec<QueueTrack>> {
        Ok(self.context.database.tracks(queue_id, filter).await?)
    }

    /// Searches the catalog
    pub async fn search_tracks(&self, query: &str) -> Result<Vec<Track>> {
        Ok(self.context.songs.search(query).await?)
    }

    fn notify(&self, queue_id: &QueueId) {
        self.context.emit(CollabEvent::QueueUpdated {
            room_id: queue_id.room_id.clone(),
            user_id: queue_id.user_id.clone(),
        });
    }
}
