//! In-memory EPUB fixtures.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// Builds an EPUB archive file by file.
pub struct EpubBuilder {
    files: Vec<(String, Vec<u8>)>,
}

impl EpubBuilder {
    /// Archive with `mimetype` and a container.xml pointing at `OEBPS/content.opf`.
    pub fn new() -> Self {
        Self {
            files: vec![("META-INF/container.xml".to_string(), CONTAINER_XML.into())],
        }
    }

    /// Archive with only the `mimetype` entry.
    pub fn bare() -> Self {
        Self { files: Vec::new() }
    }

    pub fn file(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.files.push((path.to_string(), data.into()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();
        for (path, data) in self.files {
            zip.start_file(path, deflated).unwrap();
            zip.write_all(&data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}

/// Manifest item: `(id, href, media-type, properties)`.
pub type Item<'a> = (&'a str, &'a str, &'a str, Option<&'a str>);

pub fn opf(
    title: &str,
    author: &str,
    extra_meta: &str,
    items: &[Item],
    spine: &[&str],
    toc: Option<&str>,
) -> String {
    let mut manifest = String::new();
    for (id, href, media_type, properties) in items {
        let properties = properties
            .map(|p| format!(r#" properties="{p}""#))
            .unwrap_or_default();
        manifest.push_str(&format!(
            r#"    <item id="{id}" href="{href}" media-type="{media_type}"{properties}/>
"#
        ));
    }

    let itemrefs: String = spine
        .iter()
        .map(|id| format!("    <itemref idref=\"{id}\"/>\n"))
        .collect();
    let toc = toc.map(|id| format!(r#" toc="{id}""#)).unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>{title}</dc:title>
    <dc:creator>{author}</dc:creator>
    <dc:language>en</dc:language>
    {extra_meta}
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine{toc}>
{itemrefs}  </spine>
</package>"#
    )
}

pub fn xhtml(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>{title}</title><style>p {{ margin: 0 }}</style></head>
<body>
{body}
</body>
</html>"#
    )
}

/// EPUB3 navigation document listing `(title, href)` pairs.
pub fn nav(entries: &[(&str, &str)]) -> String {
    let items: String = entries
        .iter()
        .map(|(title, href)| format!("<li><a href=\"{href}\">{title}</a></li>\n"))
        .collect();
    xhtml(
        "Contents",
        &format!("<nav epub:type=\"toc\" id=\"toc\"><h1>Contents</h1><ol>\n{items}</ol></nav>"),
    )
}

/// NCX listing `(title, src)` pairs.
pub fn ncx(entries: &[(&str, &str)]) -> String {
    let points: String = entries
        .iter()
        .enumerate()
        .map(|(i, (title, src))| {
            format!(
                r#"<navPoint id="np{i}" playOrder="{}"><navLabel><text>{title}</text></navLabel><content src="{src}"/></navPoint>
"#,
                i + 1
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
<head><meta name="dtb:uid" content="uid"/></head>
<docTitle><text>Book</text></docTitle>
<navMap>
{points}</navMap>
</ncx>"#
    )
}

/// A three-chapter EPUB3 book with a cover and one illustrated chapter.
pub fn sample_epub() -> Vec<u8> {
    let items = [
        ("nav", "nav.xhtml", "application/xhtml+xml", Some("nav")),
        ("cover", "images/cover.png", "image/png", Some("cover-image")),
        ("fig", "images/fig1.png", "image/png", None),
        ("ch1", "text/ch1.xhtml", "application/xhtml+xml", None),
        ("ch2", "text/ch2.xhtml", "application/xhtml+xml", None),
        ("ch3", "text/ch3.xhtml", "application/xhtml+xml", None),
    ];

    EpubBuilder::new()
        .file(
            "OEBPS/content.opf",
            opf("Sample &amp; Co", "Ada Writer", "", &items, &["ch1", "ch2", "ch3"], None),
        )
        .file(
            "OEBPS/nav.xhtml",
            nav(&[
                ("The Beginning", "text/ch1.xhtml"),
                ("Pictures", "text/ch2.xhtml#top"),
                ("Ghost", "text/missing.xhtml"),
                ("The End", "text/ch3.xhtml"),
            ]),
        )
        .file("OEBPS/images/cover.png", PNG)
        .file("OEBPS/images/fig1.png", PNG)
        .file(
            "OEBPS/text/ch1.xhtml",
            xhtml(
                "One",
                "<h1>The Beginning</h1>\n<p>First paragraph.</p>\n<p>Second   paragraph.</p>",
            ),
        )
        .file(
            "OEBPS/text/ch2.xhtml",
            xhtml(
                "Two",
                r#"<p>Before the figure.</p>
<div class="figure"><img src="../images/fig1.png" alt="Figure 1"/></div>
<p>After the figure.</p>
<img src="https://example.com/remote.png"/>
<p>Still going.</p>"#,
            ),
        )
        .file("OEBPS/text/ch3.xhtml", xhtml("Three", "<p>Finis.</p>"))
        .build()
}
