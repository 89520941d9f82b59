//! Small key/value cache for precomputed aggregates.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use super::InvalidationScope;

#[derive(Debug, Clone)]
struct ScalarEntry<V> {
    value: V,
    inserted: Instant,
}

/// TTL cache that evicts the oldest-inserted keys once `max_entries` is exceeded.
#[derive(Debug)]
pub struct ScalarCache<V> {
    entries: HashMap<String, ScalarEntry<V>>,
    order: VecDeque<String>,
    ttl: Duration,
    max_entries: usize,
}

impl<V: Clone> ScalarCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| now.saturating_duration_since(entry.inserted) <= self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Insert or replace a value. Replacing counts as a fresh insertion.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        self.insert_at(key.into(), value, Instant::now());
    }

    fn insert_at(&mut self, key: String, value: V, now: Instant) {
        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, ScalarEntry { value, inserted: now });

        while self.entries.len() > self.max_entries {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.order.retain(|k| k != key);
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Remove every key matching the scope. Returns the count removed.
    pub fn invalidate_matching(&mut self, scope: &InvalidationScope) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !scope.matches(key));
        self.order.retain(|key| !scope.matches(key));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
