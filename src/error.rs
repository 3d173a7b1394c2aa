//! Error types for layerbook operations.

use thiserror::Error;

/// Errors that can occur while opening a book or serving its chapters.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),

    #[error("Missing required element: {0}")]
    MissingElement(String),

    #[error("Chapter {id} not found (book has {count} chapters)")]
    ChapterNotFound { id: usize, count: usize },

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a single image inside a section could not be turned into a handle.
///
/// These never escape the tree walk: the image is skipped and the chapter
/// continues.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("external image URL is not resolvable inside the book: {0}")]
    External(String),

    #[error("image not found in container: {0}")]
    Missing(String),

    #[error("invalid image data: {0}")]
    InvalidData(String),
}
