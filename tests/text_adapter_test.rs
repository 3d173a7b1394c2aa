//! Plain-text adapter tests through the public API.

use std::io::Write;
use std::sync::Arc;

use layerbook::{
    Adapter, BookFormat, ChapterLocator, ReaderConfig, ResourceRegistry, TextAdapter, load_config,
    open_book,
};

const NOVEL: &str = "\
Chapter 1: Arrival
The train was late.

She waited on the platform.
Chapter 2: Departure
  Nobody came.
";

#[test]
fn test_two_headings_split_into_two_chapters() {
    let (book, adapter) =
        open_book(NOVEL.as_bytes().to_vec(), "novel.txt", &ReaderConfig::default()).unwrap();
    assert_eq!(book.format, BookFormat::Plain);
    assert_eq!(book.chapter_count(), 2);
    assert_eq!(book.chapters[0].title, "Chapter 1: Arrival");
    assert_eq!(
        book.chapters[1].locator,
        Some(ChapterLocator::Lines { start: 4, end: 6 })
    );

    let resources = ResourceRegistry::new();
    let first = adapter.load_chapter(&book, 0, &resources).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(
        first[0].paragraphs,
        vec!["The train was late.", "She waited on the platform."]
    );

    let second = adapter.load_chapter(&book, 1, &resources).unwrap();
    assert_eq!(second[0].paragraphs, vec!["  Nobody came."]);
}

#[test]
fn test_cjk_chapters() {
    let text = "第一章 风起\n山雨欲来。\n第二章 云涌\n风满楼。\n";
    let book = TextAdapter::new()
        .parse(Arc::from(text.as_bytes()), "wind.txt")
        .unwrap();
    let titles: Vec<_> = book.chapters.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["第一章 风起", "第二章 云涌"]);
}

#[test]
fn test_long_chapter_is_chunked() {
    let paragraph = "word ".repeat(1000);
    let mut text = String::from("Chapter 1\n");
    for _ in 0..10 {
        text.push_str(&paragraph);
        text.push('\n');
    }

    let book = TextAdapter::new()
        .parse(Arc::from(text.as_bytes()), "long.txt")
        .unwrap();
    let layers = TextAdapter::new()
        .load_chapter(&book, 0, &ResourceRegistry::new())
        .unwrap();

    // Each paragraph is 5000 chars; three fit in 15000.
    assert_eq!(layers.len(), 4);
    assert_eq!(layers[1].start_index, 3);
    assert_eq!(layers[3].paragraphs.len(), 1);
    assert!(layers.iter().all(|l| l.char_len() <= 15_000));
}

#[test]
fn test_config_file_controls_adapter() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[chunking]\nmax_layer_length = 10\n\n[text]\nmax_heading_chars = 9"
    )
    .unwrap();
    let config = load_config(file.path()).unwrap();

    let text = "Chapter 1\naaaaaa\nbbbbbb\nChapter 2 is too long to be a heading\n";
    let (book, adapter) = open_book(text.as_bytes().to_vec(), "c.txt", &config).unwrap();
    assert_eq!(book.chapter_count(), 1);

    let layers = adapter
        .load_chapter(&book, 0, &ResourceRegistry::new())
        .unwrap();
    assert_eq!(layers.len(), 3);
    assert_eq!(
        layers[2].paragraphs,
        vec!["Chapter 2 is too long to be a heading"]
    );
}

#[test]
fn test_utf8_bom_and_crlf() {
    let text = "\u{FEFF}Chapter 1\r\nline one\r\n\r\nline two\r\n";
    let book = TextAdapter::new()
        .parse(Arc::from(text.as_bytes()), "bom.txt")
        .unwrap();
    assert_eq!(book.chapters[0].title, "Chapter 1");

    let layers = TextAdapter::new()
        .load_chapter(&book, 0, &ResourceRegistry::new())
        .unwrap();
    assert_eq!(layers[0].paragraphs, vec!["line one", "line two"]);
}

#[test]
fn test_invalid_bytes_never_fail() {
    let bytes: &[u8] = b"Chapter 1\n\xFF\xFE\xFD broken\n";
    let book = TextAdapter::new()
        .parse(Arc::from(bytes), "broken.txt")
        .unwrap();
    let layers = TextAdapter::new()
        .load_chapter(&book, 0, &ResourceRegistry::new())
        .unwrap();
    assert!(layers[0].paragraphs[0].contains('\u{FFFD}'));
}

#[test]
fn test_empty_file() {
    let book = TextAdapter::new()
        .parse(Arc::from(&b""[..]), "empty.txt")
        .unwrap();
    assert_eq!(book.chapter_count(), 1);
    let layers = TextAdapter::new()
        .load_chapter(&book, 0, &ResourceRegistry::new())
        .unwrap();
    assert!(layers.is_empty());
}
