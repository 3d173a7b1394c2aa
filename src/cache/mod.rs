//! Sliding-window chapter cache.
//!
//! The cache owns every loaded chapter's layers. A chapter is either absent
//! (unloaded) or resident with the logical time of its last access. After an
//! insertion pushes the cache over capacity, the least recently accessed
//! entry is evicted and its image handles revoked.
//!
//! Each successful [`ChapterCache::get_chapter`] also queues the neighboring
//! chapters for read-ahead; the queue only runs in [`ChapterCache::run_idle`].

mod prefetch;

pub use prefetch::{PrefetchReport, PrefetchWindow};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{DEFAULT_CACHE_CAPACITY, ReaderConfig};
use crate::error::Result;
use crate::import::{Adapter, Layers, chapter_or_not_found};
use crate::model::{ResourceRegistry, UnifiedBook};
use prefetch::PrefetchQueue;

#[derive(Debug)]
struct CacheEntry {
    chapter_id: usize,
    layers: Layers,
    last_access: u64,
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub resident: usize,
    pub capacity: usize,
    /// Ascending.
    pub resident_ids: Vec<usize>,
}

/// Chapter cache for one open book.
pub struct ChapterCache {
    book: UnifiedBook,
    adapter: Box<dyn Adapter>,
    resources: ResourceRegistry,
    entries: HashMap<usize, CacheEntry>,
    capacity: usize,
    window: PrefetchWindow,
    queue: PrefetchQueue,
    /// Logical clock, bumped on every access.
    clock: u64,
}

impl ChapterCache {
    pub fn new(book: UnifiedBook, adapter: Box<dyn Adapter>) -> Self {
        Self {
            book,
            adapter,
            resources: ResourceRegistry::new(),
            entries: HashMap::new(),
            capacity: DEFAULT_CACHE_CAPACITY,
            window: PrefetchWindow::default(),
            queue: PrefetchQueue::default(),
            clock: 0,
        }
    }

    pub fn with_config(
        book: UnifiedBook,
        adapter: Box<dyn Adapter>,
        config: &ReaderConfig,
    ) -> Self {
        let mut cache = Self::new(book, adapter);
        cache.capacity = config.cache.capacity.max(1);
        cache.window = PrefetchWindow {
            behind: config.cache.prefetch_behind,
            ahead: config.cache.prefetch_ahead,
        };
        cache
    }

    pub fn book(&self) -> &UnifiedBook {
        &self.book
    }

    /// Registry holding the image data of resident chapters.
    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn is_resident(&self, id: usize) -> bool {
        self.entries.contains_key(&id)
    }

    /// Layers of chapter `id`, loading it on a miss.
    ///
    /// Out-of-range ids fail with `ChapterNotFound`. Adapter errors are
    /// returned as-is and nothing is cached.
    pub fn get_chapter(&mut self, id: usize) -> Result<Layers> {
        chapter_or_not_found(&self.book, id)?;
        let now = self.tick();

        let layers = match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.last_access = now;
                debug!(chapter = id, "Cache hit");
                Arc::clone(&entry.layers)
            }
            None => {
                let layers = self.adapter.load_chapter(&self.book, id, &self.resources)?;
                self.queue.complete(id);
                self.insert(id, Arc::clone(&layers), now);
                layers
            }
        };

        self.schedule_prefetch(id);
        Ok(layers)
    }

    /// Drain the prefetch queue, loading each neighbor that is not resident.
    ///
    /// Failures are logged and do not stop the batch.
    pub fn run_idle(&mut self) -> PrefetchReport {
        let mut report = PrefetchReport::default();

        while let Some(batch) = self.queue.next_batch() {
            for id in batch {
                self.queue.complete(id);
                if self.is_resident(id) {
                    report.skipped.push(id);
                    continue;
                }

                match self.adapter.load_chapter(&self.book, id, &self.resources) {
                    Ok(layers) => {
                        let now = self.tick();
                        self.insert(id, layers, now);
                        report.loaded.push(id);
                    }
                    Err(err) => {
                        warn!(chapter = id, "Prefetch failed: {err}");
                        report.failed.push(id);
                    }
                }
            }
        }

        if !report.is_empty() {
            debug!(
                loaded = ?report.loaded,
                skipped = ?report.skipped,
                failed = ?report.failed,
                "Prefetch pass finished"
            );
        }
        report
    }

    /// Chapter ids queued for prefetch, in execution order.
    pub fn pending_prefetch(&self) -> Vec<usize> {
        self.queue.pending()
    }

    /// Evict everything and drop queued prefetch work.
    pub fn clear(&mut self) {
        let ids: Vec<usize> = self.entries.keys().copied().collect();
        for id in ids {
            self.evict(id);
        }
        self.queue.clear();
        debug!("Cache cleared");
    }

    /// Switch to another book, releasing everything held for the current one.
    pub fn replace_book(&mut self, book: UnifiedBook, adapter: Box<dyn Adapter>) {
        self.clear();
        self.book = book;
        self.adapter = adapter;
    }

    pub fn stats(&self) -> CacheStats {
        let mut resident_ids: Vec<usize> = self.entries.keys().copied().collect();
        resident_ids.sort_unstable();
        CacheStats {
            resident: resident_ids.len(),
            capacity: self.capacity,
            resident_ids,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn insert(&mut self, id: usize, layers: Layers, now: u64) {
        if let Some(chapter) = self.book.chapters.get_mut(id) {
            chapter.layers = Arc::clone(&layers);
            chapter.is_loaded = true;
        }
        debug!(chapter = id, layers = layers.len(), "Cached chapter");
        self.entries.insert(
            id,
            CacheEntry {
                chapter_id: id,
                layers,
                last_access: now,
            },
        );

        while self.entries.len() > self.capacity {
            let Some(victim) = self.lru_victim() else {
                break;
            };
            self.evict(victim);
        }
    }

    /// Smallest `last_access` among all resident entries, ties by id.
    fn lru_victim(&self) -> Option<usize> {
        self.entries
            .values()
            .min_by_key(|entry| (entry.last_access, entry.chapter_id))
            .map(|entry| entry.chapter_id)
    }

    fn evict(&mut self, id: usize) {
        let Some(entry) = self.entries.remove(&id) else {
            return;
        };
        if let Some(chapter) = self.book.chapters.get_mut(id) {
            chapter.unload();
        }

        let revoked = entry
            .layers
            .iter()
            .filter_map(|layer| layer.image.as_ref())
            .filter(|image| self.resources.revoke(image))
            .count();
        debug!(chapter = id, images = revoked, "Evicted chapter");
    }

    fn schedule_prefetch(&mut self, id: usize) {
        let targets: Vec<usize> = self
            .window
            .targets(id, self.book.chapter_count())
            .into_iter()
            .filter(|&target| !self.is_resident(target) && !self.queue.is_in_flight(target))
            .collect();

        if !targets.is_empty() {
            debug!(chapter = id, targets = ?targets, "Scheduled prefetch");
            self.queue.schedule(targets);
        }
    }
}
