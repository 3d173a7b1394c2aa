//! Format adapters.
//!
//! An [`Adapter`] works in two phases:
//! - `parse` builds the book skeleton (metadata and unloaded chapters)
//! - `load_chapter` turns one chapter into a sequence of [`ContentLayer`]s
//!
//! Adapters keep no state between calls: everything `load_chapter` needs is
//! re-derived from the book's immutable raw bytes.

mod epub;
mod text;
mod walk;

pub use epub::EpubAdapter;
pub use text::{MAX_HEADING_CHARS, TextAdapter};
pub use walk::{SectionWalker, walk_section};

use std::sync::Arc;

use percent_encoding::percent_decode_str;

use crate::config::ReaderConfig;
use crate::error::{Error, ImageError, Result};
use crate::model::{BookFormat, ContentLayer, ResourceRegistry, UnifiedBook, UnifiedChapter};

/// Loaded content of one chapter.
pub type Layers = Arc<[ContentLayer]>;

/// Polymorphic interface for format-specific backends.
pub trait Adapter: Send + Sync {
    /// Format this adapter understands.
    fn format(&self) -> BookFormat;

    /// Parse raw bytes into a book skeleton. No chapter content is loaded.
    fn parse(&self, bytes: Arc<[u8]>, name: &str) -> Result<UnifiedBook>;

    /// Produce the layers of chapter `id`.
    ///
    /// Returns the chapter's current layers unchanged when it is already
    /// loaded. Images minted along the way are registered in `resources`.
    fn load_chapter(
        &self,
        book: &UnifiedBook,
        id: usize,
        resources: &ResourceRegistry,
    ) -> Result<Layers>;
}

/// Open raw bytes with the adapter matching their format.
pub fn open_book(
    bytes: impl Into<Arc<[u8]>>,
    name: &str,
    config: &ReaderConfig,
) -> Result<(UnifiedBook, Box<dyn Adapter>)> {
    let bytes = bytes.into();
    let adapter = adapter_for(BookFormat::detect(name, &bytes), config);
    let book = adapter.parse(bytes, name)?;
    Ok((book, adapter))
}

/// Construct the adapter for `format`.
pub fn adapter_for(format: BookFormat, config: &ReaderConfig) -> Box<dyn Adapter> {
    match format {
        BookFormat::Plain => Box::new(TextAdapter::with_config(config)),
        BookFormat::Markup => Box::new(EpubAdapter::with_config(config)),
    }
}

/// Look up chapter `id`, failing with `ChapterNotFound` when out of range.
pub(crate) fn chapter_or_not_found(book: &UnifiedBook, id: usize) -> Result<&UnifiedChapter> {
    book.chapter(id).ok_or(Error::ChapterNotFound {
        id,
        count: book.chapter_count(),
    })
}

/// Title fallback: the file name without directories or extension.
pub(crate) fn file_stem(name: &str) -> &str {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rfind('.') {
        Some(dot) if dot > 0 => &base[..dot],
        _ => base,
    }
}

/// True for hrefs that point outside the book (`https://…`, `//host/…`, `mailto:…`).
pub(crate) fn is_external(href: &str) -> bool {
    if href.starts_with("//") || href.contains("://") {
        return true;
    }
    // Scheme-only URLs such as mailto: or tel:
    href.split_once(':').is_some_and(|(scheme, _)| {
        scheme.len() > 1
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
            && !scheme.eq_ignore_ascii_case("data")
    })
}

/// Resolve an archive reference found in the file at `base`.
///
/// `..` pops a segment, `.` and empty segments are no-ops, and a leading `/`
/// keeps the path verbatim. Fragments and queries are dropped and percent
/// escapes decoded.
///
/// For example, with base `OEBPS/text/ch01.xhtml`, `../images/a%20b.png#x`
/// resolves to `OEBPS/images/a b.png`.
pub fn resolve_relative_path(base: &str, relative: &str) -> String {
    let relative = relative
        .split(['#', '?'])
        .next()
        .unwrap_or_default();
    let relative = percent_decode_str(relative).decode_utf8_lossy();

    if relative.starts_with('/') {
        return relative.into_owned();
    }

    let mut segments: Vec<&str> = match base.rfind('/') {
        Some(slash) => base[..slash].split('/').filter(|s| !s.is_empty()).collect(),
        None => Vec::new(),
    };

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Resolve an image `src` against its section, rejecting external URLs.
pub fn resolve_image_path(section: &str, src: &str) -> std::result::Result<String, ImageError> {
    let src = src.trim();
    if is_external(src) {
        return Err(ImageError::External(src.to_string()));
    }
    let resolved = resolve_relative_path(section, src);
    if resolved.is_empty() {
        return Err(ImageError::Missing(src.to_string()));
    }
    Ok(resolved)
}
