//! Random-access ZIP reading over an immutable in-memory buffer.

use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::Arc;

use zip::ZipArchive;

use crate::error::Result;

/// Binary access to the files inside a book container.
pub trait Container {
    /// Fetch the bytes stored at `path`. Missing entries are `NotFound`.
    fn request(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// EPUB container backed by the book's raw bytes.
///
/// Only the central directory is scanned on open; entries are inflated on
/// request straight from the shared buffer.
pub struct EpubArchive {
    raw: Arc<[u8]>,
    /// ZIP entry locations: path -> ZipEntryLoc.
    index: HashMap<String, ZipEntryLoc>,
}

#[derive(Clone, Copy)]
struct ZipEntryLoc {
    data_offset: u64,
    compressed_size: u64,
    compression: u16, // 0 = Store, 8 = Deflate
}

impl EpubArchive {
    /// Scan the ZIP central directory of `raw`.
    pub fn open(raw: Arc<[u8]>) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(Arc::clone(&raw)))?;
        let mut index = HashMap::with_capacity(archive.len());

        for i in 0..archive.len() {
            let file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            index.insert(
                file.name().to_string(),
                ZipEntryLoc {
                    data_offset: file.data_start(),
                    compressed_size: file.compressed_size(),
                    compression: compression_to_u16(file.compression()),
                },
            );
        }

        Ok(Self { raw, index })
    }
}

impl Container for EpubArchive {
    fn request(&self, path: &str) -> io::Result<Vec<u8>> {
        let key = archive_key(path);
        let loc = self.index.get(key).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("File not found in ZIP: {}", key),
            )
        })?;

        let start = usize::try_from(loc.data_offset).map_err(io::Error::other)?;
        let len = usize::try_from(loc.compressed_size).map_err(io::Error::other)?;
        let compressed = start
            .checked_add(len)
            .and_then(|end| self.raw.get(start..end))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("ZIP entry {} extends past end of data", key),
                )
            })?;

        match loc.compression {
            0 => Ok(compressed.to_vec()),
            8 => {
                let mut decoder = flate2::read::DeflateDecoder::new(compressed);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out)?;
                Ok(out)
            }
            method => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("Unsupported compression method: {}", method),
            )),
        }
    }
}

/// Archive entries never start with `/`; a rooted path names the archive root.
fn archive_key(path: &str) -> &str {
    path.trim_start_matches('/')
}

fn compression_to_u16(method: zip::CompressionMethod) -> u16 {
    match method {
        zip::CompressionMethod::Stored => 0,
        zip::CompressionMethod::Deflated => 8,
        _ => 255,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn build_zip() -> Arc<[u8]> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let deflated =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();
        zip.add_directory("OEBPS/", stored).unwrap();
        zip.start_file("OEBPS/text.xhtml", deflated).unwrap();
        zip.write_all("<p>deflated body</p>".repeat(50).as_bytes()).unwrap();

        Arc::from(zip.finish().unwrap().into_inner())
    }

    #[test]
    fn test_request_stored_and_deflated() {
        let archive = EpubArchive::open(build_zip()).unwrap();
        assert_eq!(archive.request("mimetype").unwrap(), b"application/epub+zip");

        let body = archive.request("OEBPS/text.xhtml").unwrap();
        assert_eq!(body, "<p>deflated body</p>".repeat(50).as_bytes());
    }

    #[test]
    fn test_rooted_path_and_missing_entry() {
        let archive = EpubArchive::open(build_zip()).unwrap();
        assert_eq!(
            archive.request("/OEBPS/text.xhtml").unwrap(),
            archive.request("OEBPS/text.xhtml").unwrap()
        );
        // Directory entries are not indexed.
        assert_eq!(
            archive.request("OEBPS/").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );

        let err = archive.request("OEBPS/missing.png").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_open_rejects_non_zip() {
        assert!(EpubArchive::open(Arc::from(&b"not a zip"[..])).is_err());
    }
}
