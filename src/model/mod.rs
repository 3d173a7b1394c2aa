//! Format-agnostic book model shared by the adapters and the chapter cache.
//!
//! A [`UnifiedBook`] is created once per open and only holds chapter
//! skeletons. Chapter content ([`ContentLayer`]s) is produced on demand by an
//! adapter and owned by the chapter cache; the `layers`/`is_loaded` fields on
//! [`UnifiedChapter`] mirror the cache for external readers.

mod resource;

pub use resource::{ImageHandle, ResourceRegistry};

use std::fmt;
use std::sync::Arc;

/// Source format of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookFormat {
    /// Plain text, split into chapters by heading lines.
    Plain,
    /// EPUB: XHTML sections with images inside a ZIP container.
    Markup,
}

impl BookFormat {
    /// Guess the format from a file name, falling back to magic bytes.
    pub fn detect(name: &str, bytes: &[u8]) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".epub") {
            return BookFormat::Markup;
        }
        if lower.ends_with(".txt") {
            return BookFormat::Plain;
        }
        if bytes.starts_with(b"PK\x03\x04") {
            BookFormat::Markup
        } else {
            BookFormat::Plain
        }
    }
}

impl fmt::Display for BookFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookFormat::Plain => f.write_str("plain"),
            BookFormat::Markup => f.write_str("markup"),
        }
    }
}

/// A unit of normalized content: ordered paragraphs plus at most one
/// trailing image.
///
/// Paragraph `i` occupies the chapter-global index `start_index + i`; the
/// image, when present, occupies `start_index + paragraphs.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLayer {
    pub paragraphs: Vec<String>,
    pub start_index: usize,
    pub image: Option<ImageHandle>,
}

impl ContentLayer {
    pub fn new(paragraphs: Vec<String>, start_index: usize, image: Option<ImageHandle>) -> Self {
        Self {
            paragraphs,
            start_index,
            image,
        }
    }

    /// A layer holding nothing but an image.
    pub fn image_only(image: ImageHandle, start_index: usize) -> Self {
        Self::new(Vec::new(), start_index, Some(image))
    }

    /// Single-paragraph layer describing why a chapter could not be loaded.
    pub fn diagnostic(message: impl Into<String>) -> Self {
        Self::new(vec![message.into()], 0, None)
    }

    /// Number of chapter-global indices this layer occupies.
    pub fn span(&self) -> usize {
        self.paragraphs.len() + usize::from(self.image.is_some())
    }

    /// Index of the first content unit after this layer.
    pub fn end_index(&self) -> usize {
        self.start_index + self.span()
    }

    /// Total paragraph length in characters.
    pub fn char_len(&self) -> usize {
        self.paragraphs.iter().map(|p| p.chars().count()).sum()
    }
}

/// Where a skeleton chapter's content lives in the raw source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterLocator {
    /// Plain text: line span `[start, end)`, heading line included.
    Lines { start: usize, end: usize },
    /// EPUB: canonical archive path of the content document.
    Section { path: String },
}

/// A chapter record. `layers` stays empty until the chapter is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedChapter {
    pub id: usize,
    pub title: String,
    pub layers: Arc<[ContentLayer]>,
    pub is_loaded: bool,
    pub locator: Option<ChapterLocator>,
}

impl UnifiedChapter {
    /// Create an unloaded skeleton chapter.
    pub fn skeleton(id: usize, title: impl Into<String>, locator: Option<ChapterLocator>) -> Self {
        Self {
            id,
            title: title.into(),
            layers: Arc::from(Vec::new()),
            is_loaded: false,
            locator,
        }
    }

    /// Drop mirrored content, returning the chapter to its skeleton state.
    pub(crate) fn unload(&mut self) {
        self.layers = Arc::from(Vec::new());
        self.is_loaded = false;
    }
}

/// A book opened from raw bytes.
#[derive(Debug, Clone)]
pub struct UnifiedBook {
    /// Hex SHA-1 of `raw_source`.
    pub id: String,
    pub title: String,
    pub author: String,
    pub cover: Option<Vec<u8>>,
    pub format: BookFormat,
    pub chapters: Vec<UnifiedChapter>,
    pub raw_source: Arc<[u8]>,
    /// Unix seconds.
    pub added_at: u64,
}

impl UnifiedBook {
    pub fn chapter(&self, id: usize) -> Option<&UnifiedChapter> {
        self.chapters.get(id)
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(BookFormat::detect("a.EPUB", b""), BookFormat::Markup);
        assert_eq!(BookFormat::detect("a.txt", b"PK\x03\x04"), BookFormat::Plain);
    }

    #[test]
    fn test_detect_by_magic() {
        assert_eq!(BookFormat::detect("upload", b"PK\x03\x04rest"), BookFormat::Markup);
        assert_eq!(BookFormat::detect("upload", b"Chapter 1"), BookFormat::Plain);
    }

    #[test]
    fn test_layer_span() {
        let registry = ResourceRegistry::new();
        let image = registry.mint(vec![1, 2, 3], "image/png");
        let layer = ContentLayer::new(vec!["a".into(), "b".into()], 4, Some(image));
        assert_eq!(layer.span(), 3);
        assert_eq!(layer.end_index(), 7);

        let text = ContentLayer::new(vec!["héllo".into()], 0, None);
        assert_eq!(text.span(), 1);
        assert_eq!(text.char_len(), 5);
    }

    #[test]
    fn test_skeleton_is_unloaded() {
        let chapter = UnifiedChapter::skeleton(0, "One", None);
        assert!(!chapter.is_loaded);
        assert!(chapter.layers.is_empty());
    }
}
