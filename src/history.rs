//! history.rs — bounded, per-identity record of recently dispatched item ids.
//!
//! Feeds both the duplicate filter and the pagination cursor. In-memory only.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::ingest::types::Identity;

/// Upper bound accepted for `max_history`.
pub const MAX_HISTORY_CAP: usize = 100_000;

#[derive(Debug)]
pub struct DedupHistory {
    inner: Mutex<HashMap<Identity, VecDeque<String>>>,
    cap: usize,
    cursor_tracking: bool,
}

impl DedupHistory {
    /// `cursor_tracking` mirrors `skip_duplicates`: without dedup there is no cursor.
    pub fn new(cap: usize, cursor_tracking: bool) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            cap: cap.clamp(1, MAX_HISTORY_CAP),
            cursor_tracking,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Most recently recorded id for `identity`.
    pub fn cursor_for(&self, identity: &Identity) -> Option<String> {
        if !self.cursor_tracking {
            return None;
        }
        let map = self.inner.lock();
        map.get(identity).and_then(|h| h.back().cloned())
    }

    pub fn seen_recently(&self, identity: &Identity, id: &str) -> bool {
        let map = self.inner.lock();
        map.get(identity).is_some_and(|h| h.iter().any(|x| x == id))
    }

    /// Append `id`, evicting the oldest entry first when the record is full.
    /// Duplicates are not special-cased.
    pub fn record(&self, identity: &Identity, id: &str) {
        let mut map = self.inner.lock();
        let h = map
            .entry(identity.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.cap.min(256)));
        if h.len() >= self.cap {
            h.pop_front();
        }
        h.push_back(id.to_string());
    }

    pub fn len(&self, identity: &Identity) -> usize {
        self.inner.lock().get(identity).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, identity: &Identity) -> bool {
        self.len(identity) == 0
    }

    /// Oldest first.
    pub fn snapshot(&self, identity: &Identity) -> Vec<String> {
        self.inner
            .lock()
            .get(identity)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }
}
