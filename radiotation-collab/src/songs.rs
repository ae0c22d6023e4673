use std::path::Path;

use async_trait::async_trait;
use radiotation_core::{Track, TrackId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SongError {
    #[error("Track {0} doesn't exist")]
    NotFound(TrackId),
    #[error("Catalog could not be read: {0}")]
    Io(#[from] std::io::Error),
    #[error("Catalog is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Resolves track ids to metadata.
#[async_trait]
pub trait SongServer: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Track>, SongError>;
    async fn track(&self, id: &TrackId) -> Result<Track, SongError>;
}

/// A fixed catalog of tracks kept in memory
#[derive(Debug, Default)]
pub struct Catalog {
    tracks: Vec<Track>,
}

impl Catalog {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Loads a catalog from a JSON array of tracks
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SongError> {
        let data = std::fs::read_to_string(path)?;
        Ok(Self::new(serde_json::from_str(&data)?))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[async_trait]
impl SongServer for Catalog {
    async fn search(&self, query: &str) -> Result<Vec<Track>, SongError> {
        let query = query.trim().to_lowercase();

        if query.is_empty() {
            return Ok(vec![]);
        }

        let matches = |field: &str| field.to_lowercase().contains(&query);

        Ok(self
            .tracks
            .iter()
            .filter(|t| {
                matches(&t.name)
                    || t.artists.iter().any(|a| matches(a))
                    || t.album.as_deref().map_or(false, matches)
            })
            .cloned()
            .collect())
    }

    async fn track(&self, id: &TrackId) -> Result<Track, SongError> {
        self.tracks
            .iter()
            .find(|t| &t.id == id)
            .cloned()
            .ok_or_else(|| SongError::NotFound(id.clone()))
    }
}
