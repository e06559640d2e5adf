//! Bounded per-sender session cache.
//!
//! Maps an external channel identifier to the chat/session ids of the
//! sender's ongoing conversation. The cache is advisory only: the durable
//! conversation store remains the source of truth, and losing the cache
//! (process restart, eviction) only causes a new session to start -- never
//! data loss.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

/// Conversation identifiers bound to one external sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBinding {
    pub user_id: String,
    pub chat_id: Option<Uuid>,
    pub session_id: Option<Uuid>,
    pub contact_name: Option<String>,
}

impl ChannelBinding {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id: None,
            session_id: None,
            contact_name: None,
        }
    }
}

struct Slot {
    binding: ChannelBinding,
    last_used: u64,
}

struct CacheInner {
    entries: HashMap<String, Slot>,
    tick: u64,
}

/// Least-recently-used cache of `ChannelBinding`s keyed by external sender
/// id. Capacities are small (hundreds), so eviction scans linearly.
pub struct SessionCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl SessionCache {
    /// Create a cache holding at most `capacity` bindings (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                tick: 0,
            }),
        }
    }

    /// Look up a binding, marking it most recently used.
    pub fn get(&self, key: &str) -> Option<ChannelBinding> {
        let mut inner = self.inner.lock().expect("session cache poisoned");
        inner.tick += 1;
        let tick = inner.tick;
        inner.entries.get_mut(key).map(|slot| {
            slot.last_used = tick;
            slot.binding.clone()
        })
    }

    /// Fetch the binding for `key`, creating it with `make` when absent.
    /// May evict the least recently used entry to stay within capacity.
    pub fn get_or_insert_with(
        &self,
        key: &str,
        make: impl FnOnce() -> ChannelBinding,
    ) -> ChannelBinding {
        let mut inner = self.inner.lock().expect("session cache poisoned");
        inner.tick += 1;
        let tick = inner.tick;

        if let Some(slot) = inner.entries.get_mut(key) {
            slot.last_used = tick;
            return slot.binding.clone();
        }

        if inner.entries.len() >= self.capacity {
            if let Some(victim) = inner
                .entries
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&victim);
            }
        }

        let binding = make();
        inner.entries.insert(
            key.to_string(),
            Slot {
                binding: binding.clone(),
                last_used: tick,
            },
        );
        binding
    }

    /// Mutate the binding for `key` in place, if cached.
    pub fn update(&self, key: &str, apply: impl FnOnce(&mut ChannelBinding)) {
        let mut inner = self.inner.lock().expect("session cache poisoned");
        inner.tick += 1;
        let tick = inner.tick;
        if let Some(slot) = inner.entries.get_mut(key) {
            slot.last_used = tick;
            apply(&mut slot.binding);
        }
    }

    /// Drop the binding for `key`. Returns false when it was not cached.
    pub fn remove(&self, key: &str) -> bool {
        self.inner
            .lock()
            .expect("session cache poisoned")
            .entries
            .remove(key)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("session cache poisoned")
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(user: &str) -> ChannelBinding {
        ChannelBinding::new(user)
    }

    #[test]
    fn test_get_missing_returns_none() {
        let cache = SessionCache::new(4);
        assert!(cache.get("5511").is_none());
    }

    #[test]
    fn test_insert_and_get() {
        let cache = SessionCache::new(4);
        cache.get_or_insert_with("5511", || binding("whatsapp_5511"));
        let got = cache.get("5511").unwrap();
        assert_eq!(got.user_id, "whatsapp_5511");
        assert!(got.chat_id.is_none());
    }

    #[test]
    fn test_update_mutates_in_place() {
        let cache = SessionCache::new(4);
        cache.get_or_insert_with("5511", || binding("whatsapp_5511"));
        let chat_id = Uuid::now_v7();
        cache.update("5511", |b| b.chat_id = Some(chat_id));
        assert_eq!(cache.get("5511").unwrap().chat_id, Some(chat_id));
    }

    #[test]
    fn test_update_missing_is_noop() {
        let cache = SessionCache::new(4);
        cache.update("ghost", |b| b.chat_id = Some(Uuid::now_v7()));
        assert!(cache.get("ghost").is_none());
    }

    #[test]
    fn test_eviction_drops_least_recently_used() {
        let cache = SessionCache::new(2);
        cache.get_or_insert_with("a", || binding("ua"));
        cache.get_or_insert_with("b", || binding("ub"));
        // Touch "a" so "b" becomes the LRU entry.
        cache.get("a");
        cache.get_or_insert_with("c", || binding("uc"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_remove() {
        let cache = SessionCache::new(4);
        cache.get_or_insert_with("a", || binding("ua"));
        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_floor_of_one() {
        let cache = SessionCache::new(0);
        cache.get_or_insert_with("a", || binding("ua"));
        cache.get_or_insert_with("b", || binding("ub"));
        assert_eq!(cache.len(), 1);
    }
}
