//! Bounded phrase → audio cache
//!
//! Eviction is by insertion order: when full, the oldest inserted key goes,
//! regardless of how recently it was read.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

/// Cache key for a phrase: trimmed and lower-cased
pub fn normalize_key(phrase: &str) -> String {
    phrase.trim().to_lowercase()
}

struct Inner {
    entries: HashMap<String, String>,
    order: VecDeque<String>,
}

/// Thread-safe FIFO cache of synthesized phrase audio (data URLs)
pub struct PhraseCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl PhraseCache {
    /// A capacity of zero is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Insert or replace. Replacing keeps the key's original position.
    pub fn put(&self, key: impl Into<String>, audio: impl Into<String>) {
        let key = key.into();
        let audio = audio.into();
        let mut inner = self.inner.lock();

        if let Some(existing) = inner.entries.get_mut(&key) {
            *existing = audio;
            return;
        }

        if inner.entries.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                tracing::trace!(evicted = %oldest, "Phrase cache full, evicted oldest entry");
            }
        }

        inner.order.push_back(key.clone());
        inner.entries.insert(key, audio);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
