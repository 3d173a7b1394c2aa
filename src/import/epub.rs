//! EPUB adapter.
//!
//! `parse` reads the package document and navigation to build skeletons whose
//! locators are canonical archive paths. `load_chapter` re-opens the archive
//! over the book's raw bytes, parses one XHTML section and walks it into
//! layers. Section failures never escape `load_chapter`: the chapter becomes a
//! single diagnostic layer instead.

use std::collections::HashSet;
use std::io;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chunk::MAX_LAYER_LENGTH;
use crate::config::ReaderConfig;
use crate::dom::parse_html;
use crate::epub::{
    Container, EpubArchive, OpfData, TocEntry, flatten_toc, parse_container_xml, parse_nav,
    parse_ncx, parse_opf,
};
use crate::error::{Error, Result};
use crate::import::walk::SectionWalker;
use crate::import::{Adapter, Layers, chapter_or_not_found, file_stem, resolve_relative_path};
use crate::model::{
    BookFormat, ChapterLocator, ContentLayer, ResourceRegistry, UnifiedBook, UnifiedChapter,
};
use crate::util::{content_id, decode_markup, time_now_secs};

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Adapter for EPUB 2/3 books.
#[derive(Debug, Clone)]
pub struct EpubAdapter {
    max_layer_length: usize,
}

impl Default for EpubAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl EpubAdapter {
    pub fn new() -> Self {
        Self {
            max_layer_length: MAX_LAYER_LENGTH,
        }
    }

    pub fn with_config(config: &ReaderConfig) -> Self {
        Self {
            max_layer_length: config.chunking.max_layer_length,
        }
    }

    fn load_section(
        &self,
        book: &UnifiedBook,
        chapter: &UnifiedChapter,
        resources: &ResourceRegistry,
    ) -> Result<Vec<ContentLayer>> {
        let archive = EpubArchive::open(Arc::clone(&book.raw_source))?;
        let path = match &chapter.locator {
            Some(ChapterLocator::Section { path }) => path.clone(),
            // Positional fallback: the chapter's slot in the spine.
            _ => Package::read(&archive)?
                .spine
                .into_iter()
                .nth(chapter.id)
                .ok_or_else(|| Error::MissingElement(format!("spine item {}", chapter.id)))?,
        };

        let bytes = archive.request(&path)?;
        let dom = parse_html(&decode_markup(&bytes));
        Ok(SectionWalker::new(&path, &archive, resources)
            .with_max_layer_length(self.max_layer_length)
            .walk(&dom))
    }
}

impl Adapter for EpubAdapter {
    fn format(&self) -> BookFormat {
        BookFormat::Markup
    }

    fn parse(&self, bytes: Arc<[u8]>, name: &str) -> Result<UnifiedBook> {
        let archive = EpubArchive::open(Arc::clone(&bytes))?;
        let package = Package::read(&archive)?;

        let title = match package.opf.title.trim() {
            "" => file_stem(name).to_string(),
            title => title.to_string(),
        };
        let author = if package.opf.authors.is_empty() {
            "Unknown".to_string()
        } else {
            package.opf.authors.join(", ")
        };

        let cover = package.cover(&archive);

        let mut chapters = match package.navigation(&archive) {
            Some((nav_path, entries)) => chapters_from_toc(&nav_path, &entries, &package.spine),
            None => Vec::new(),
        };
        if chapters.is_empty() {
            debug!("No usable navigation, enumerating the spine");
            chapters = chapters_from_spine(&package.spine);
        }

        info!(
            title = %title,
            chapters = chapters.len(),
            format = %BookFormat::Markup,
            "Opened book"
        );

        Ok(UnifiedBook {
            id: content_id(&bytes),
            title,
            author,
            cover,
            format: BookFormat::Markup,
            chapters,
            raw_source: bytes,
            added_at: time_now_secs(),
        })
    }

    fn load_chapter(
        &self,
        book: &UnifiedBook,
        id: usize,
        resources: &ResourceRegistry,
    ) -> Result<Layers> {
        let chapter = chapter_or_not_found(book, id)?;
        if chapter.is_loaded {
            return Ok(Arc::clone(&chapter.layers));
        }

        match self.load_section(book, chapter, resources) {
            Ok(layers) => {
                debug!(chapter = id, layers = layers.len(), "Loaded chapter");
                Ok(layers.into())
            }
            Err(err) => {
                warn!(chapter = id, title = %chapter.title, "Chapter failed to load: {err}");
                let message = format!("Unable to load \"{}\": {err}", chapter.title);
                Ok(Arc::from(vec![ContentLayer::diagnostic(message)]))
            }
        }
    }
}

/// The parsed package document with its spine resolved to archive paths.
struct Package {
    opf_path: String,
    opf: OpfData,
    spine: Vec<String>,
}

impl Package {
    fn read(archive: &EpubArchive) -> Result<Self> {
        let container = archive.request(CONTAINER_PATH).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => Error::InvalidEpub(format!("missing {CONTAINER_PATH}")),
            _ => Error::Io(err),
        })?;
        let opf_path = parse_container_xml(&container)?;

        let opf_bytes = archive.request(&opf_path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => {
                Error::InvalidEpub(format!("package document {opf_path} not found"))
            }
            _ => Error::Io(err),
        })?;
        let opf = parse_opf(&decode_markup(&opf_bytes))?;

        let spine = opf
            .spine_hrefs()
            .map(|href| resolve_relative_path(&opf_path, href))
            .collect();

        Ok(Self {
            opf_path,
            opf,
            spine,
        })
    }

    /// Cover image bytes. A missing or unreadable cover is not an error.
    fn cover(&self, archive: &EpubArchive) -> Option<Vec<u8>> {
        let href = self.opf.cover_href.as_deref()?;
        let path = resolve_relative_path(&self.opf_path, href);
        match archive.request(&path) {
            Ok(data) => Some(data),
            Err(err) => {
                warn!(path = %path, "Cover unavailable: {err}");
                None
            }
        }
    }

    /// Table of contents from the EPUB3 navigation document, else the NCX.
    ///
    /// Returns the path the entry hrefs are relative to along with the entries.
    fn navigation(&self, archive: &EpubArchive) -> Option<(String, Vec<TocEntry>)> {
        let sources: [(Option<&str>, fn(&str) -> Result<Vec<TocEntry>>); 2] = [
            (self.opf.nav_href.as_deref(), parse_nav),
            (self.opf.ncx_href.as_deref(), parse_ncx),
        ];

        for (href, parse) in sources {
            let Some(href) = href else { continue };
            let path = resolve_relative_path(&self.opf_path, href);
            let entries = archive
                .request(&path)
                .map_err(Error::from)
                .and_then(|bytes| parse(&decode_markup(&bytes)));
            match entries {
                Ok(entries) if !entries.is_empty() => return Some((path, entries)),
                Ok(_) => debug!(path = %path, "Navigation file has no entries"),
                Err(err) => warn!(path = %path, "Ignoring unreadable navigation: {err}"),
            }
        }
        None
    }
}

/// Build skeletons from navigation entries, flattened depth-first.
///
/// Entries that do not resolve to a spine section are dropped. Entries that
/// point into a section already claimed by an earlier entry merge into it.
fn chapters_from_toc(
    nav_path: &str,
    entries: &[TocEntry],
    spine: &[String],
) -> Vec<UnifiedChapter> {
    let sections: HashSet<&str> = spine.iter().map(String::as_str).collect();
    let mut claimed: HashSet<String> = HashSet::new();
    let mut chapters = Vec::new();

    for entry in flatten_toc(entries) {
        let path = resolve_relative_path(nav_path, &entry.href);
        if !sections.contains(path.as_str()) {
            warn!(
                href = %entry.href,
                title = %entry.title,
                "Dropping navigation entry outside the spine"
            );
            continue;
        }
        if !claimed.insert(path.clone()) {
            debug!(href = %entry.href, "Merging navigation entry into earlier chapter");
            continue;
        }

        let title = match entry.title.trim() {
            "" => format!("Section {}", chapters.len() + 1),
            title => title.to_string(),
        };
        chapters.push(UnifiedChapter::skeleton(
            chapters.len(),
            title,
            Some(ChapterLocator::Section { path }),
        ));
    }

    chapters
}

fn chapters_from_spine(spine: &[String]) -> Vec<UnifiedChapter> {
    spine
        .iter()
        .enumerate()
        .map(|(i, path)| {
            UnifiedChapter::skeleton(
                i,
                format!("Section {}", i + 1),
                Some(ChapterLocator::Section { path: path.clone() }),
            )
        })
        .collect()
}
