//! layerbook - inspect how a book is split into chapters and layers

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use layerbook::{ChapterCache, ContentLayer, ReaderConfig, UnifiedBook, load_config, open_book};

#[derive(Parser)]
#[command(name = "layerbook")]
#[command(version, about = "Inspect chapter skeletons and content layers", long_about = None)]
#[command(after_help = "EXAMPLES:
    layerbook novel.txt              List chapters and dump chapter 0
    layerbook book.epub -c 3         Dump the layers of chapter 3
    layerbook book.epub -c 3 --json  Same, as JSON")]
struct Cli {
    /// Input file (plain text or EPUB)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Chapter to load
    #[arg(short, long, default_value_t = 0)]
    chapter: usize,

    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the chapter layers as JSON
    #[arg(long)]
    json: bool,

    /// Only print the chapter layers
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => ReaderConfig::default(),
    };
    init_tracing(&config.log_level);

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, config: &ReaderConfig) -> layerbook::Result<()> {
    let bytes = std::fs::read(&cli.input)?;
    let name = cli.input.to_string_lossy();
    let (book, adapter) = open_book(bytes, &name, config)?;

    if !cli.quiet {
        show_skeleton(&book);
    }

    let mut cache = ChapterCache::with_config(book, adapter, config);
    let layers = cache.get_chapter(cli.chapter)?;

    if cli.json {
        println!("{}", layers_json(cli.chapter, &layers));
    } else {
        let title = &cache.book().chapters[cli.chapter].title;
        println!("== Chapter {}: {title} ({} layers)", cli.chapter, layers.len());
        for (i, layer) in layers.iter().enumerate() {
            show_layer(i, layer);
        }
    }

    if !cli.quiet {
        let report = cache.run_idle();
        let stats = cache.stats();
        println!();
        println!("Prefetched: {:?}", report.loaded);
        if !report.failed.is_empty() {
            println!("Prefetch failures: {:?}", report.failed);
        }
        println!(
            "Resident: {}/{} {:?}",
            stats.resident, stats.capacity, stats.resident_ids
        );
    }

    Ok(())
}

fn show_skeleton(book: &UnifiedBook) {
    println!("Title: {}", book.title);
    println!("Author: {}", book.author);
    println!("Format: {}", book.format);
    println!("Id: {}", book.id);
    if let Some(cover) = &book.cover {
        println!("Cover: {} bytes", cover.len());
    }
    println!("Chapters: {}", book.chapter_count());
    for chapter in &book.chapters {
        println!("  [{:>3}] {}", chapter.id, chapter.title);
    }
    println!();
}

fn show_layer(i: usize, layer: &ContentLayer) {
    println!(
        "-- layer {i}: start {}, {} paragraphs, {} chars",
        layer.start_index,
        layer.paragraphs.len(),
        layer.char_len()
    );
    for (offset, paragraph) in layer.paragraphs.iter().enumerate() {
        println!("{:>6}  {}", layer.start_index + offset, preview(paragraph, 100));
    }
    if let Some(image) = &layer.image {
        println!(
            "{:>6}  [image {} {}]",
            layer.start_index + layer.paragraphs.len(),
            image.media_type(),
            image.url()
        );
    }
}

fn layers_json(chapter: usize, layers: &[ContentLayer]) -> serde_json::Value {
    let layers: Vec<serde_json::Value> = layers
        .iter()
        .map(|layer| {
            serde_json::json!({
                "start_index": layer.start_index,
                "paragraphs": layer.paragraphs,
                "image": layer.image.as_ref().map(|image| serde_json::json!({
                    "url": image.url(),
                    "media_type": image.media_type(),
                })),
            })
        })
        .collect();
    serde_json::json!({ "chapter": chapter, "layers": layers })
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
