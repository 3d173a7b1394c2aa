//! Plain-text adapter.
//!
//! Chapters are split at heading lines (`第一章`, `Chapter 12`, `Part IV` ...).
//! Parsing only records each chapter's line span; loading re-decodes the raw
//! bytes and chunks the lines of one span.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info};

use crate::chunk::{MAX_LAYER_LENGTH, chunk_with_limit};
use crate::config::ReaderConfig;
use crate::error::Result;
use crate::import::{Adapter, Layers, chapter_or_not_found, file_stem};
use crate::model::{BookFormat, ChapterLocator, ResourceRegistry, UnifiedBook, UnifiedChapter};
use crate::util::{content_id, decode_text, time_now_secs};

/// Default cap on the length of a heading line, in characters.
pub const MAX_HEADING_CHARS: usize = 60;

const PREFACE_TITLE: &str = "Preface";

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:",
        r"第[0-9０-９零〇一二两三四五六七八九十百千万]+[章节回卷部篇集].*",
        r"|",
        r"(?:chapter|section|volume|part|book)\s+",
        r"(?:\d+|(?P<roman>[ivxlc]+)|one|two|three|four|five|six|seven|eight|nine|ten",
        r"|eleven|twelve|thirteen|fourteen|fifteen|sixteen|seventeen|eighteen",
        r"|nineteen|twenty)\b.*",
        r")$"
    ))
    .unwrap()
});

/// Well-formed roman numerals up to 399.
static ROMAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^c{0,3}(?:xc|xl|l?x{0,3})(?:ix|iv|v?i{0,3})$").unwrap()
});

/// Adapter for plain-text books.
#[derive(Debug, Clone)]
pub struct TextAdapter {
    max_layer_length: usize,
    max_heading_chars: usize,
}

impl Default for TextAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextAdapter {
    pub fn new() -> Self {
        Self {
            max_layer_length: MAX_LAYER_LENGTH,
            max_heading_chars: MAX_HEADING_CHARS,
        }
    }

    pub fn with_config(config: &ReaderConfig) -> Self {
        Self {
            max_layer_length: config.chunking.max_layer_length,
            max_heading_chars: config.text.max_heading_chars,
        }
    }

    /// True if the (trimmed) line starts a new chapter.
    pub fn is_heading(&self, line: &str) -> bool {
        let line = line.trim();
        !line.is_empty()
            && line.chars().count() <= self.max_heading_chars
            && HEADING_RE.captures(line).is_some_and(|caps| {
                caps.name("roman")
                    .is_none_or(|numeral| ROMAN_RE.is_match(numeral.as_str()))
            })
    }

    /// Split decoded text into chapter skeletons with line-span locators.
    fn skeletons(&self, text: &str, book_title: &str) -> Vec<UnifiedChapter> {
        let lines: Vec<&str> = text.lines().collect();
        let headings: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| self.is_heading(line))
            .map(|(i, _)| i)
            .collect();

        let Some(&first) = headings.first() else {
            let whole = ChapterLocator::Lines {
                start: 0,
                end: lines.len(),
            };
            return vec![UnifiedChapter::skeleton(0, book_title, Some(whole))];
        };

        let mut chapters = Vec::with_capacity(headings.len() + 1);
        if lines[..first].iter().any(|line| !line.trim().is_empty()) {
            let preface = ChapterLocator::Lines {
                start: 0,
                end: first,
            };
            chapters.push(UnifiedChapter::skeleton(0, PREFACE_TITLE, Some(preface)));
        }
        for (i, &start) in headings.iter().enumerate() {
            let end = headings.get(i + 1).copied().unwrap_or(lines.len());
            chapters.push(UnifiedChapter::skeleton(
                chapters.len(),
                lines[start].trim(),
                Some(ChapterLocator::Lines { start, end }),
            ));
        }
        chapters
    }

    /// Line span of chapter `id` found by title, for chapters without a locator.
    fn span_by_title(&self, book: &UnifiedBook, id: usize, lines: &[&str]) -> (usize, usize) {
        let title = book.chapters[id].title.as_str();
        let start = match lines.iter().position(|line| line.trim() == title) {
            Some(pos) => pos,
            None if id == 0 => 0,
            None => return (lines.len(), lines.len()),
        };

        let end = book
            .chapters
            .get(id + 1)
            .and_then(|next| {
                lines
                    .get(start + 1..)
                    .unwrap_or_default()
                    .iter()
                    .position(|line| line.trim() == next.title)
                    .map(|offset| start + 1 + offset)
            })
            .unwrap_or(lines.len());

        (start, end)
    }
}

impl Adapter for TextAdapter {
    fn format(&self) -> BookFormat {
        BookFormat::Plain
    }

    fn parse(&self, bytes: Arc<[u8]>, name: &str) -> Result<UnifiedBook> {
        let title = file_stem(name).to_string();
        let chapters = self.skeletons(&decode_text(&bytes), &title);

        info!(
            title = %title,
            chapters = chapters.len(),
            format = %BookFormat::Plain,
            "Opened book"
        );

        Ok(UnifiedBook {
            id: content_id(&bytes),
            title,
            author: "Unknown".to_string(),
            cover: None,
            format: BookFormat::Plain,
            chapters,
            raw_source: bytes,
            added_at: time_now_secs(),
        })
    }

    fn load_chapter(
        &self,
        book: &UnifiedBook,
        id: usize,
        _resources: &ResourceRegistry,
    ) -> Result<Layers> {
        let chapter = chapter_or_not_found(book, id)?;
        if chapter.is_loaded {
            return Ok(Arc::clone(&chapter.layers));
        }

        let text = decode_text(&book.raw_source);
        let lines: Vec<&str> = text.lines().collect();
        let (start, end) = match chapter.locator {
            Some(ChapterLocator::Lines { start, end }) => (start, end.min(lines.len())),
            _ => self.span_by_title(book, id, &lines),
        };

        let paragraphs: Vec<String> = lines
            .get(start..end)
            .unwrap_or_default()
            .iter()
            // Indentation (including full-width U+3000) is content.
            .filter(|line| !line.trim().is_empty() && !self.is_heading(line))
            .map(|line| line.to_string())
            .collect();

        let (layers, next) = chunk_with_limit(paragraphs, 0, None, self.max_layer_length);
        debug!(chapter = id, layers = layers.len(), paragraphs = next, "Loaded chapter");
        Ok(layers.into())
    }
}
