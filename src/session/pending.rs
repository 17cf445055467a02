//! Recognized links waiting for the user to pick a format.

use crate::media::VideoLink;
use moka::future::Cache;
use std::time::Duration;
use tracing::debug;

/// Short-lived `video_id -> link` map
///
/// Entries are kept after use so the same message can serve both an audio
/// and a video request until the TTL runs out.
#[derive(Clone)]
pub struct PendingLinks {
    cache: Cache<String, VideoLink>,
}

impl PendingLinks {
    /// Creates the map with the given lifetime and capacity
    #[must_use]
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Remembers a link under its video id
    pub async fn remember(&self, link: VideoLink) {
        let video_id = link.video_id.clone();
        self.cache.insert(video_id.clone(), link).await;
        debug!(
            video_id = %video_id,
            pending = self.cache.entry_count(),
            "Remembered link"
        );
    }

    /// Looks up a link; `None` once it expired
    pub async fn get(&self, video_id: &str) -> Option<VideoLink> {
        self.cache.get(video_id).await
    }
}
