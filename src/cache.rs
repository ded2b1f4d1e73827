use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry<V> {
    data: V,
    stored_at: Instant,
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    order: VecDeque<String>,
}

/// Read-through cache with a time-to-live and a bounded number of entries.
/// When full, the oldest insertion is evicted. Writers are serialized by a mutex.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    capacity: usize,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut inner = self.inner.lock().ok()?;
        let expired = match inner.entries.get(key) {
            Some(entry) if now.saturating_duration_since(entry.stored_at) < self.ttl => {
                return Some(entry.data.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.entries.remove(key);
            inner.order.retain(|existing| existing != key);
        }
        None
    }

    pub fn insert(&self, key: impl Into<String>, data: V) {
        self.insert_at(key, data, Instant::now());
    }

    pub fn insert_at(&self, key: impl Into<String>, data: V, now: Instant) {
        let key = key.into();
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.entries.contains_key(&key) {
            inner.order.retain(|existing| *existing != key);
        }
        while inner.entries.len() >= self.capacity && !inner.entries.contains_key(&key) {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
        }
        inner.order.push_back(key.clone());
        inner.entries.insert(
            key,
            Entry {
                data,
                stored_at: now,
            },
        );
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let Ok(mut inner) = self.inner.lock() else {
            return 0;
        };
        let ttl = self.ttl;
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, entry| now.saturating_duration_since(entry.stored_at) < ttl);
        let Inner { entries, order } = &mut *inner;
        order.retain(|key| entries.contains_key(key));
        before - entries.len()
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.clear();
            inner.order.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire_after_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60), 8);
        let start = Instant::now();
        cache.insert_at("fpb|joao", 1, start);
        assert_eq!(cache.get_at("fpb|joao", start + Duration::from_secs(59)), Some(1));
        assert_eq!(cache.get_at("fpb|joao", start + Duration::from_secs(60)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn oldest_insertion_is_evicted() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);
        cache.insert("c", 3);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn purge_and_clear() {
        let cache = TtlCache::new(Duration::from_secs(10), 4);
        let start = Instant::now();
        cache.insert_at("old", 1, start);
        cache.insert_at("new", 2, start + Duration::from_secs(8));
        assert_eq!(cache.purge_expired_at(start + Duration::from_secs(12)), 1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
