//! In-memory cache of recently served content items.
//!
//! Search responses are the only place content ids are minted, so a stream
//! request for an id needs this map to find its torrent refs again.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::ContentItem;

struct CacheEntry {
    item: ContentItem,
    inserted_at: Instant,
}

/// TTL and capacity bounded map of content id to item.
pub struct ContentCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
}

impl ContentCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Look up a live entry.
    pub async fn get(&self, id: &str) -> Option<ContentItem> {
        let entries = self.entries.read().await;
        entries
            .get(id)
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| entry.item.clone())
    }

    /// Insert or refresh a batch of items.
    ///
    /// Expired entries are purged first; if the map is still over capacity
    /// the oldest entries are evicted.
    pub async fn insert_all(&self, items: &[ContentItem]) {
        if items.is_empty() {
            return;
        }

        let mut entries = self.entries.write().await;
        let now = Instant::now();
        for item in items {
            entries.insert(
                item.id.clone(),
                CacheEntry {
                    item: item.clone(),
                    inserted_at: now,
                },
            );
        }

        let ttl = self.ttl;
        entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);

        if entries.len() > self.capacity {
            let mut by_age: Vec<(String, Instant)> = entries
                .iter()
                .map(|(id, entry)| (id.clone(), entry.inserted_at))
                .collect();
            by_age.sort_by_key(|(_, inserted_at)| *inserted_at);
            let excess = entries.len() - self.capacity;
            for (id, _) in by_age.into_iter().take(excess) {
                entries.remove(&id);
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = ContentCache::new(Duration::from_secs(60), 10);
        let item = fixtures::movie("yts", "The Matrix", 1999, 10);
        cache.insert_all(std::slice::from_ref(&item)).await;

        assert_eq!(cache.get(&item.id).await, Some(item));
        assert!(cache.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entries_are_not_returned() {
        let cache = ContentCache::new(Duration::ZERO, 10);
        let item = fixtures::movie("yts", "The Matrix", 1999, 10);
        cache.insert_all(std::slice::from_ref(&item)).await;

        assert!(cache.get(&item.id).await.is_none());
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let cache = ContentCache::new(Duration::from_secs(60), 2);
        let first = fixtures::movie("yts", "First", 2001, 1);
        let second = fixtures::movie("yts", "Second", 2002, 1);
        let third = fixtures::movie("yts", "Third", 2003, 1);

        cache.insert_all(std::slice::from_ref(&first)).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        cache.insert_all(&[second.clone(), third.clone()]).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get(&first.id).await.is_none());
        assert!(cache.get(&second.id).await.is_some());
        assert!(cache.get(&third.id).await.is_some());
    }
}
