//! # layerbook
//!
//! Lazily loaded, size-bounded book content for continuous-scroll readers.
//!
//! ## Features
//!
//! - Plain-text books split into chapters by heading lines, in UTF-8 or GBK
//! - EPUB 2/3 books with navigation, covers and inline images
//! - Chapters normalized into [`ContentLayer`]s of bounded size with stable
//!   paragraph/image indices
//! - A sliding-window [`ChapterCache`] with idle-time read-ahead
//!
//! ## Quick Start
//!
//! ```no_run
//! use layerbook::{ChapterCache, ReaderConfig, open_book};
//!
//! let bytes = std::fs::read("novel.epub").unwrap();
//! let config = ReaderConfig::default();
//! let (book, adapter) = open_book(bytes, "novel.epub", &config).unwrap();
//!
//! let mut cache = ChapterCache::with_config(book, adapter, &config);
//! for layer in cache.get_chapter(0).unwrap().iter() {
//!     println!("{}: {} paragraphs", layer.start_index, layer.paragraphs.len());
//! }
//!
//! // Later, when the host is idle:
//! cache.run_idle();
//! ```
//!
//! ## Layers
//!
//! Every paragraph and image of a chapter gets a chapter-global index. A
//! layer covers a contiguous run of them:
//!
//! ```
//! use layerbook::chunk;
//!
//! let paragraphs = vec!["a".repeat(7000), "b".repeat(7000), "c".repeat(7000)];
//! let (layers, next) = chunk(paragraphs, 0, None);
//!
//! assert_eq!(layers.len(), 2);
//! assert_eq!(layers[1].start_index, 2);
//! assert_eq!(next, 3);
//! ```

pub mod cache;
pub mod chunk;
pub mod config;
pub mod dom;
pub mod epub;
pub mod error;
pub mod import;
pub mod model;
pub mod util;

pub use cache::{CacheStats, ChapterCache, PrefetchReport};
pub use chunk::{MAX_LAYER_LENGTH, chunk, chunk_with_limit};
pub use config::{ReaderConfig, load_config};
pub use error::{Error, ImageError, Result};
pub use import::{Adapter, EpubAdapter, Layers, TextAdapter, open_book};
pub use model::{
    BookFormat, ChapterLocator, ContentLayer, ImageHandle, ResourceRegistry, UnifiedBook,
    UnifiedChapter,
};
