//! Low-priority read-ahead queue.
//!
//! Foreground requests only enqueue work here. Batches are drained by
//! [`ChapterCache::run_idle`](super::ChapterCache::run_idle) when the host has
//! an idle gap, so a foreground load never waits behind a prefetch.

use std::collections::{HashSet, VecDeque};

use crate::config::{DEFAULT_PREFETCH_AHEAD, DEFAULT_PREFETCH_BEHIND};

/// Neighborhood of the current chapter to read ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchWindow {
    pub behind: usize,
    pub ahead: usize,
}

impl Default for PrefetchWindow {
    fn default() -> Self {
        Self {
            behind: DEFAULT_PREFETCH_BEHIND,
            ahead: DEFAULT_PREFETCH_AHEAD,
        }
    }
}

impl PrefetchWindow {
    /// Neighbors of `current` within `[0, count)`, nearest previous chapters
    /// first, then following chapters in reading order.
    pub fn targets(&self, current: usize, count: usize) -> Vec<usize> {
        let behind = (1..=self.behind).filter_map(|d| current.checked_sub(d));
        let ahead = (1..=self.ahead).filter_map(|d| current.checked_add(d));
        behind.chain(ahead).filter(|&id| id < count).collect()
    }
}

/// Outcome of one [`run_idle`](super::ChapterCache::run_idle) pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    /// Chapters loaded into the cache.
    pub loaded: Vec<usize>,
    /// Chapters already resident by the time their batch ran.
    pub skipped: Vec<usize>,
    /// Chapters whose load failed.
    pub failed: Vec<usize>,
}

impl PrefetchReport {
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty() && self.skipped.is_empty() && self.failed.is_empty()
    }
}

#[derive(Debug, Default)]
pub(crate) struct PrefetchQueue {
    batches: VecDeque<Vec<usize>>,
    in_flight: HashSet<usize>,
}

impl PrefetchQueue {
    /// Queue `ids` as one batch and mark them in flight.
    pub(crate) fn schedule(&mut self, ids: Vec<usize>) {
        if ids.is_empty() {
            return;
        }
        self.in_flight.extend(ids.iter().copied());
        self.batches.push_back(ids);
    }

    pub(crate) fn next_batch(&mut self) -> Option<Vec<usize>> {
        self.batches.pop_front()
    }

    pub(crate) fn is_in_flight(&self, id: usize) -> bool {
        self.in_flight.contains(&id)
    }

    /// Release the in-flight mark of `id`.
    pub(crate) fn complete(&mut self, id: usize) {
        self.in_flight.remove(&id);
    }

    /// Targets of all queued batches, in execution order.
    pub(crate) fn pending(&self) -> Vec<usize> {
        self.batches.iter().flatten().copied().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.batches.clear();
        self.in_flight.clear();
    }
}
