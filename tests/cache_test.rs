//! Chapter cache behavior over real adapters.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use layerbook::{
    Adapter, BookFormat, ChapterCache, Error, Layers, ReaderConfig, ResourceRegistry,
    TextAdapter, UnifiedBook, open_book,
};

/// Wraps an adapter and counts `load_chapter` calls per chapter.
struct LoadProbe {
    inner: Box<dyn Adapter>,
    loads: Arc<Vec<AtomicUsize>>,
}

impl LoadProbe {
    fn wrap(inner: Box<dyn Adapter>, chapters: usize) -> (Self, Arc<Vec<AtomicUsize>>) {
        let loads = Arc::new((0..chapters).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>());
        let probe = Self {
            inner,
            loads: Arc::clone(&loads),
        };
        (probe, loads)
    }
}

impl Adapter for LoadProbe {
    fn format(&self) -> BookFormat {
        self.inner.format()
    }

    fn parse(&self, bytes: Arc<[u8]>, name: &str) -> layerbook::Result<UnifiedBook> {
        self.inner.parse(bytes, name)
    }

    fn load_chapter(
        &self,
        book: &UnifiedBook,
        id: usize,
        resources: &ResourceRegistry,
    ) -> layerbook::Result<Layers> {
        if let Some(count) = self.loads.get(id) {
            count.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.load_chapter(book, id, resources)
    }
}

fn text_book(chapters: usize) -> Vec<u8> {
    (0..chapters)
        .map(|i| format!("Chapter {}\nbody of chapter {}\n", i + 1, i + 1))
        .collect::<String>()
        .into_bytes()
}

fn probed_cache(chapters: usize) -> (ChapterCache, Arc<Vec<AtomicUsize>>) {
    let (book, adapter) =
        open_book(text_book(chapters), "book.txt", &ReaderConfig::default()).unwrap();
    let (probe, loads) = LoadProbe::wrap(adapter, chapters);
    (ChapterCache::new(book, Box::new(probe)), loads)
}

fn total(loads: &[AtomicUsize]) -> usize {
    loads.iter().map(|c| c.load(Ordering::SeqCst)).sum()
}

#[test]
fn test_neighbors_become_resident_after_idle() {
    let (mut cache, loads) = probed_cache(10);
    cache.get_chapter(2).unwrap();
    cache.run_idle();

    let stats = cache.stats();
    assert_eq!(stats.resident_ids, vec![1, 2, 3, 4]);
    assert!(stats.resident <= stats.capacity);
    assert_eq!(total(&loads), 4);
}

#[test]
fn test_capacity_never_exceeded_while_reading() {
    let (mut cache, loads) = probed_cache(12);
    for id in 0..12 {
        cache.get_chapter(id).unwrap();
        assert!(cache.stats().resident <= 5);
        cache.run_idle();
        assert!(cache.stats().resident <= 5);
        assert!(cache.is_resident(id));
    }

    // Prefetch ran ahead of every foreground read, so each chapter loaded once.
    for (id, count) in loads.iter().enumerate() {
        assert_eq!(count.load(Ordering::SeqCst), 1, "chapter {id}");
    }
}

#[test]
fn test_repeated_get_loads_once() {
    let (mut cache, loads) = probed_cache(3);
    for _ in 0..4 {
        cache.get_chapter(1).unwrap();
    }
    assert_eq!(loads[1].load(Ordering::SeqCst), 1);
}

#[test]
fn test_least_recently_used_is_evicted() {
    let (mut cache, _) = probed_cache(10);
    for id in [0, 1, 2, 3, 4, 0, 1, 9] {
        cache.get_chapter(id).unwrap();
    }
    assert_eq!(cache.stats().resident_ids, vec![0, 1, 3, 4, 9]);
    assert!(!cache.book().chapters[2].is_loaded);
}

#[test]
fn test_queued_prefetch_evicts_global_minimum() {
    let (mut cache, _) = probed_cache(10);
    cache.get_chapter(2).unwrap();
    cache.get_chapter(7).unwrap();

    // Batches [1, 3, 4] then [6, 8, 9]: 2 goes at 6's insert, 7 at 8's, 1 at 9's.
    let report = cache.run_idle();
    assert_eq!(report.loaded, vec![1, 3, 4, 6, 8, 9]);
    assert_eq!(cache.stats().resident_ids, vec![3, 4, 6, 8, 9]);
    assert!(!cache.book().chapters[7].is_loaded);
}

#[test]
fn test_get_out_of_range() {
    let (mut cache, loads) = probed_cache(2);
    assert!(matches!(
        cache.get_chapter(2),
        Err(Error::ChapterNotFound { id: 2, count: 2 })
    ));
    assert_eq!(total(&loads), 0);
}

#[test]
fn test_clear_releases_everything() {
    let (mut cache, loads) = probed_cache(6);
    cache.get_chapter(0).unwrap();
    cache.get_chapter(1).unwrap();
    assert!(!cache.pending_prefetch().is_empty());

    cache.clear();
    assert!(cache.stats().resident_ids.is_empty());
    assert!(cache.pending_prefetch().is_empty());
    assert!(cache.run_idle().is_empty());

    cache.get_chapter(0).unwrap();
    assert_eq!(loads[0].load(Ordering::SeqCst), 2);
}

#[test]
fn test_epub_images_revoked_on_eviction() {
    let (book, adapter) =
        open_book(common::sample_epub(), "sample.epub", &ReaderConfig::default()).unwrap();
    let mut config = ReaderConfig::default();
    config.cache.capacity = 1;
    config.cache.prefetch_ahead = 0;
    config.cache.prefetch_behind = 0;
    let mut cache = ChapterCache::with_config(book, adapter, &config);

    let layers = cache.get_chapter(1).unwrap();
    let figure = layers[0].image.clone().expect("figure");
    assert!(cache.resources().is_live(&figure));

    cache.get_chapter(2).unwrap();
    assert!(!cache.resources().is_live(&figure));
    assert_eq!(cache.resources().live_count(), 0);
    assert_eq!(cache.stats().resident_ids, vec![2]);
}

#[test]
fn test_replace_book_switches_source() {
    let (mut cache, _) = probed_cache(3);
    cache.get_chapter(0).unwrap();

    let (other, adapter) =
        open_book(common::sample_epub(), "sample.epub", &ReaderConfig::default()).unwrap();
    cache.replace_book(other, adapter);
    assert_eq!(cache.book().format, BookFormat::Markup);
    assert!(cache.stats().resident_ids.is_empty());

    let layers = cache.get_chapter(2).unwrap();
    assert_eq!(layers[0].paragraphs, vec!["Finis."]);

    let plain = TextAdapter::new()
        .parse(Arc::from(text_book(1)), "one.txt")
        .unwrap();
    cache.replace_book(plain, Box::new(TextAdapter::new()));
    assert_eq!(cache.book().chapter_count(), 1);
}
