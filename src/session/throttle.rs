//! Rate limiting for status message edits.
//!
//! Telegram rejects bursts of edits to the same message, so progress
//! updates go through [`EditThrottle`] first.

use moka::future::Cache;
use std::time::{Duration, Instant};

/// `(chat_id, message_id)` of a status message
pub type MessageKey = (i64, i32);

/// Last-edit timestamps per status message
#[derive(Clone)]
pub struct EditThrottle {
    cache: Cache<MessageKey, Instant>,
    interval: Duration,
}

impl EditThrottle {
    /// Creates a throttle allowing one edit per `interval`.
    ///
    /// Entries nobody forgot expire after `ttl`.
    #[must_use]
    pub fn new(interval: Duration, ttl: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { cache, interval }
    }

    /// Returns `true` and records the edit when enough time has passed.
    pub async fn try_acquire(&self, key: MessageKey) -> bool {
        self.try_acquire_at(key, Instant::now()).await
    }

    /// Same as [`Self::try_acquire`] with an explicit clock reading.
    pub async fn try_acquire_at(&self, key: MessageKey, now: Instant) -> bool {
        if let Some(last) = self.cache.get(&key).await {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.cache.insert(key, now).await;
        true
    }

    /// Drops the entry of a finished upload
    pub async fn forget(&self, key: MessageKey) {
        self.cache.invalidate(&key).await;
    }
}
