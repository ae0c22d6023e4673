use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Id, UserId};

pub type TrackId = Id<Track>;

/// A track as the catalog describes it.
/// The engine only ever looks at the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub album: Option<String>,
    /// Url to the cover art
    #[serde(default)]
    pub artwork: Option<String>,
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<f32>,
}

impl Track {
    pub fn new(id: impl Into<TrackId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artists: vec![],
            album: None,
            artwork: None,
            duration: None,
        }
    }

    /// All artists joined for display
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }
}

/// A track that was served in a room, and who it was served for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackEntry {
    pub user_id: UserId,
    pub track: Track,
    pub vetoed: bool,
    /// Only set if the entry was vetoed
    pub vetoed_by: Option<UserId>,
    pub played_at: DateTime<Utc>,
}

impl TrackEntry {
    pub fn new(user_id: UserId, track: Track) -> Self {
        Self {
            user_id,
            track,
            vetoed: false,
            vetoed_by: None,
            played_at: Utc::now(),
        }
    }
}
