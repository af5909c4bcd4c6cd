//! Bounded question → SQL cache.
//!
//! Fixed capacity, insertion-ordered, oldest entry evicted first. Writing an
//! existing key replaces its value in place (last writer wins) without
//! refreshing its position.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

pub const DEFAULT_CACHE_CAPACITY: usize = 200;

/// Key for a question asked after `history_len` earlier turns.
///
/// Questions are trimmed, lowercased and whitespace-collapsed, so
/// "Vue  stars" and "vue stars" share an entry.
pub fn cache_key(question: &str, history_len: usize) -> String {
    let normalized: Vec<String> = question
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    format!("{}|{history_len}", normalized.join(" "))
}

#[derive(Debug, Default)]
struct Entries {
    order: VecDeque<String>,
    values: HashMap<String, String>,
}

#[derive(Debug)]
pub struct QueryCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().values.get(key).cloned()
    }

    pub fn insert(&self, key: String, sql: String) {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.values.get_mut(&key) {
            *existing = sql;
            return;
        }
        while entries.order.len() >= self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.values.remove(&oldest);
            tracing::debug!(key = %oldest, "evicted cached query");
        }
        entries.order.push_back(key.clone());
        entries.values.insert(key, sql);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.order.clear();
        entries.values.clear();
    }
}
