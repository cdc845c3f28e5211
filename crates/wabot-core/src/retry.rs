use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// Process-wide delivery-retry counters, keyed by message id.
///
/// Message ids are globally unique, so one cache is safely shared by every
/// session in the process. Constructed once at startup and injected through
/// `ConnectOptions`.
#[derive(Clone, Debug, Default)]
pub struct RetryCounterCache {
    inner: Arc<Mutex<HashMap<String, u32>>>,
}

impl RetryCounterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bump the counter for a message id and return the new count.
    pub fn increment(&self, message_id: &str) -> u32 {
        let mut map = self.inner.lock().unwrap();
        let count = map.entry(message_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn get(&self, message_id: &str) -> u32 {
        let map = self.inner.lock().unwrap();
        map.get(message_id).copied().unwrap_or(0)
    }

    /// Forget a message id once delivery settles.
    pub fn clear(&self, message_id: &str) {
        let mut map = self.inner.lock().unwrap();
        map.remove(message_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_message_id() {
        let cache = RetryCounterCache::new();
        assert_eq!(cache.get("m1"), 0);
        assert_eq!(cache.increment("m1"), 1);
        assert_eq!(cache.increment("m1"), 2);
        assert_eq!(cache.increment("m2"), 1);

        cache.clear("m1");
        assert_eq!(cache.get("m1"), 0);
        assert_eq!(cache.get("m2"), 1);
    }

    #[test]
    fn clones_share_state() {
        let cache = RetryCounterCache::new();
        let other = cache.clone();
        other.increment("m1");
        assert_eq!(cache.get("m1"), 1);
    }
}
