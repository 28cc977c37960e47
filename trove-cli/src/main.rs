use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use trove_core::collect::Collector;
use trove_core::config::Config;
use trove_core::embed::embed_products;
use trove_core::embedding::Embedder;
use trove_core::embedding::clip::{ClipImageEmbedder, ClipTextEmbedder, FUSED_MODEL_NAME};
use trove_core::ingest::{infer_dimensions, ingest_records};
use trove_core::query::run_query;
use trove_core::store::sqlite::SqliteVectorStore;
use trove_core::store::{QueryMatch, VectorStore};
use trove_core::types::{load_embeddings, load_products, save_embeddings};

const DEMO_QUERIES: &[(&str, &str)] = &[
    ("Query 1 - Color & Style", "royal blue sharara suit"),
    ("Query 2 - Fabric / Occasion", "formal wear for a mehndi"),
    ("Query 3 - Cross-modal imagery", "dress that looks like a flower garden"),
];

/// Captions longer than this are truncated in match listings.
const CAPTION_WIDTH: usize = 140;

#[derive(Parser)]
#[command(name = "trove", about = "Multimodal product search pipeline")]
struct Cli {
    /// Path to the config file
    #[arg(long, default_value = "trove.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl the product sitemap and download images
    Scrape {
        /// Override the configured product cap
        #[arg(long)]
        max_products: Option<usize>,
    },
    /// Generate fused text+image embeddings for scraped products
    Embed,
    /// Upsert embedded products into the vector store
    Index,
    /// Search the collection; omit TEXT for an interactive loop
    Query {
        /// Free-text query
        text: Option<String>,
        /// Number of nearest neighbors to show
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Run the canned demo queries and save a transcript
    Demo {
        /// Destination path for the transcript
        #[arg(long, default_value = "demo_queries_output.txt")]
        output: PathBuf,
    },
    /// Show collection statistics
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });

    let result = match cli.command {
        Command::Scrape { max_products } => cmd_scrape(&config, max_products).await,
        Command::Embed => cmd_embed(&config),
        Command::Index => cmd_index(&config),
        Command::Query { text, top_k } => cmd_query(&config, text.as_deref(), top_k),
        Command::Demo { output } => cmd_demo(&config, &output),
        Command::Status => cmd_status(&config),
    };

    if let Err(msg) = result {
        eprintln!("Error: {msg}");
        process::exit(1);
    }
}

async fn cmd_scrape(config: &Config, max_products: Option<usize>) -> Result<(), String> {
    let max = max_products.unwrap_or(config.crawl.max_products);
    if max == 0 {
        return Err("max_products must be at least 1".to_string());
    }

    let collector = Collector::new(&config.crawl).map_err(|e| e.to_string())?;
    let summary = collector.run(max).await.map_err(|e| e.to_string())?;

    println!("scrape finished");
    println!("  collected: {}", summary.collected);
    println!("  skipped:   {}", summary.skipped);
    println!(
        "  images:    {} downloaded, {} reused",
        summary.images_downloaded, summary.images_reused
    );
    Ok(())
}

fn cmd_embed(config: &Config) -> Result<(), String> {
    let metadata_path = config.crawl.metadata_path();
    let products = load_products(&metadata_path)?;
    if products.is_empty() {
        return Err(format!(
            "no products in '{}'; run `trove scrape` first",
            metadata_path.display()
        ));
    }

    println!("loading CLIP models (downloads on first run)...");
    let text_embedder = ClipTextEmbedder::new().map_err(|e| e.to_string())?;
    let image_embedder = ClipImageEmbedder::new().map_err(|e| e.to_string())?;

    let (records, summary) = embed_products(
        &products,
        &text_embedder,
        &image_embedder,
        config.embedding.missing_image,
    );
    if records.is_empty() {
        return Err("no products could be embedded".to_string());
    }

    let embeddings_path = config.crawl.embeddings_path();
    save_embeddings(&embeddings_path, &records)?;

    println!("embedding finished");
    println!("  embedded:    {}", summary.embedded);
    println!(
        "  skipped:     {} text, {} image, {} zero-norm",
        summary.skipped_text, summary.skipped_image, summary.skipped_norm
    );
    println!("  zero-filled: {}", summary.zero_filled);
    println!("  output:      {}", embeddings_path.display());
    Ok(())
}

fn cmd_index(config: &Config) -> Result<(), String> {
    let embeddings_path = config.crawl.embeddings_path();
    let records = load_embeddings(&embeddings_path)?;
    let dimensions = infer_dimensions(&records).ok_or_else(|| {
        format!(
            "no usable records in '{}'; run `trove embed` first",
            embeddings_path.display()
        )
    })?;

    let store = SqliteVectorStore::open(
        Path::new(&config.storage.store_dir),
        &config.storage.collection,
        FUSED_MODEL_NAME,
        dimensions,
    )
    .map_err(|e| e.to_string())?;

    let summary = ingest_records(&records, &store).map_err(|e| e.to_string())?;
    let total = store.count().map_err(|e| e.to_string())?;

    println!("index finished");
    println!("  ingested: {}", summary.ingested);
    println!("  skipped:  {}", summary.skipped);
    println!(
        "  total:    {total} entries in '{}' ({dimensions}d)",
        config.storage.collection
    );
    Ok(())
}

fn cmd_query(config: &Config, text: Option<&str>, top_k: Option<usize>) -> Result<(), String> {
    let top_k = top_k.unwrap_or(config.query.top_k);
    if top_k == 0 {
        return Err("top_k must be at least 1".to_string());
    }

    let store = open_collection(config)?;
    let dimensions = store.stats().map_err(|e| e.to_string())?.dimensions;

    println!("loading CLIP text model (downloads on first run)...");
    let embedder = ClipTextEmbedder::new().map_err(|e| e.to_string())?;

    match text {
        Some(text) => {
            let matches = run_query(&store, &embedder, dimensions, text, top_k)?;
            print!("{}", render_query_output(text, dimensions, &matches));
            Ok(())
        }
        None => interactive_loop(&store, &embedder, dimensions, top_k),
    }
}

fn cmd_demo(config: &Config, output: &Path) -> Result<(), String> {
    let store = open_collection(config)?;
    let dimensions = store.stats().map_err(|e| e.to_string())?.dimensions;

    println!("loading CLIP text model (downloads on first run)...");
    let embedder = ClipTextEmbedder::new().map_err(|e| e.to_string())?;

    let mut transcript = String::new();
    for (title, text) in DEMO_QUERIES {
        let matches = run_query(&store, &embedder, dimensions, text, config.query.top_k)?;
        transcript.push_str(&format!("================ {title} ================\n"));
        transcript.push_str(&render_query_output(text, dimensions, &matches));
        transcript.push('\n');
    }

    std::fs::write(output, &transcript)
        .map_err(|e| format!("failed to write '{}': {e}", output.display()))?;
    println!("demo transcript saved to {}", output.display());
    Ok(())
}

fn cmd_status(config: &Config) -> Result<(), String> {
    let store = open_collection(config)?;
    let stats = store.stats().map_err(|e| e.to_string())?;

    println!("collection: {}", stats.collection);
    println!("  entries:    {}", stats.entry_count);
    println!("  dimensions: {}", stats.dimensions);
    println!("  model:      {}", stats.model_name);
    Ok(())
}

fn open_collection(config: &Config) -> Result<SqliteVectorStore, String> {
    SqliteVectorStore::open_existing(
        Path::new(&config.storage.store_dir),
        &config.storage.collection,
    )
    .map_err(|e| e.to_string())
}

fn interactive_loop(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    dimensions: usize,
    top_k: usize,
) -> Result<(), String> {
    println!("\nEnter your query (empty line to exit). Example: 'royal blue sharara suit'");
    let stdin = std::io::stdin();
    loop {
        print!("\nQuery> ");
        std::io::stdout()
            .flush()
            .map_err(|e| format!("stdout error: {e}"))?;

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .map_err(|e| format!("stdin error: {e}"))?;
        if read == 0 {
            println!("\nEOF received. Exiting.");
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            println!("Goodbye!");
            break;
        }

        match run_query(store, embedder, dimensions, query, top_k) {
            Ok(matches) => print!("{}", render_query_output(query, dimensions, &matches)),
            Err(e) => eprintln!("query failed: {e}"),
        }
    }
    Ok(())
}

fn render_query_output(query: &str, dimensions: usize, matches: &[QueryMatch]) -> String {
    let mut out = String::new();
    out.push_str("=== Query ===\n");
    out.push_str(&format!("Text: {query}\n"));
    out.push_str(&format!("Vector dim: {dimensions}\n"));

    if matches.is_empty() {
        out.push_str("No results found.\n");
        return out;
    }

    out.push_str("\n=== Top Matches ===\n");
    for (rank, m) in matches.iter().enumerate() {
        out.push_str(&format_match(rank + 1, m));
    }
    out
}

fn format_match(rank: usize, m: &QueryMatch) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n#{rank}  ID: {}\n", m.id));
    if let Some(title) = m.metadata.get("title").and_then(|v| v.as_str()) {
        out.push_str(&format!("  Title: {title}\n"));
    }
    if let Some(price) = m.metadata.get("price").and_then(|v| v.as_f64()) {
        out.push_str(&format!("  Price: {price}\n"));
    }
    out.push_str(&format!("  Distance (cosine): {:.4}\n", m.distance));
    if let Some(caption) = m.metadata.get("caption").and_then(|v| v.as_str()) {
        if !caption.is_empty() {
            out.push_str(&format!("  Caption: {}\n", shorten(caption, CAPTION_WIDTH)));
        }
    }
    if let Some(image) = m.metadata.get("image_path").and_then(|v| v.as_str()) {
        out.push_str(&format!("  Image: {image}\n"));
    }
    if let Ok(json) = serde_json::to_string_pretty(&m.metadata) {
        out.push_str("  Metadata:\n");
        for line in json.lines() {
            out.push_str(&format!("    {line}\n"));
        }
    }
    out
}

/// Truncate to roughly `width` bytes at a word boundary, appending "..."
/// when cut. Uses `char_indices` to avoid panicking on multi-byte UTF-8.
fn shorten(text: &str, width: usize) -> String {
    if text.len() <= width {
        return text.to_string();
    }

    let byte_limit = text
        .char_indices()
        .take_while(|&(i, _)| i <= width)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0);

    let truncated = &text[..byte_limit];
    match truncated.rfind(' ') {
        Some(pos) => format!("{}...", &text[..pos]),
        None => format!("{truncated}..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_match(id: &str, distance: f32) -> QueryMatch {
        QueryMatch {
            id: id.to_string(),
            distance,
            metadata: json!({
                "title": "Royal Blue Sharara Suit",
                "price": 5499.0,
                "caption": "Royal blue sharara with gold work",
                "image_path": "products/images/royal-blue.jpg"
            }),
        }
    }

    #[test]
    fn render_includes_query_header_and_ranked_matches() {
        let matches = vec![sample_match("royal-blue", 0.12), sample_match("navy", 0.34)];
        let output = render_query_output("royal blue sharara suit", 1024, &matches);

        assert!(output.contains("Text: royal blue sharara suit"));
        assert!(output.contains("Vector dim: 1024"));
        assert!(output.contains("#1  ID: royal-blue"));
        assert!(output.contains("#2  ID: navy"));
        let first = output.find("#1").unwrap();
        let second = output.find("#2").unwrap();
        assert!(first < second, "matches should render in rank order");
    }

    #[test]
    fn render_reports_empty_results() {
        let output = render_query_output("nothing", 1024, &[]);
        assert!(output.contains("No results found."));
        assert!(!output.contains("Top Matches"));
    }

    #[test]
    fn format_match_shows_distance_and_fields() {
        let output = format_match(1, &sample_match("royal-blue", 0.1234));
        assert!(output.contains("Distance (cosine): 0.1234"));
        assert!(output.contains("Title: Royal Blue Sharara Suit"));
        assert!(output.contains("Price: 5499"));
        assert!(output.contains("Image: products/images/royal-blue.jpg"));
        assert!(output.contains("Metadata:"));
    }

    #[test]
    fn format_match_tolerates_sparse_metadata() {
        let m = QueryMatch {
            id: "bare".to_string(),
            distance: 0.5,
            metadata: json!({}),
        };
        let output = format_match(3, &m);
        assert!(output.contains("#3  ID: bare"));
        assert!(!output.contains("Title:"));
        assert!(!output.contains("Price:"));
        assert!(!output.contains("Caption:"));
    }

    #[test]
    fn shorten_keeps_short_text_unchanged() {
        assert_eq!(shorten("blue suit", 140), "blue suit");
    }

    #[test]
    fn shorten_cuts_at_a_word_boundary() {
        let long = "a".repeat(60) + " " + &"b".repeat(120);
        let short = shorten(&long, 140);
        assert!(short.ends_with("..."));
        assert!(short.len() <= 144, "got {} bytes", short.len());
        assert_eq!(&short[..60], "a".repeat(60));
    }

    #[test]
    fn shorten_handles_multibyte_utf8() {
        let cjk = "日本語のテキスト".repeat(10);
        let short = shorten(&cjk, 40);
        assert!(short.ends_with("..."));
        assert!(cjk.starts_with(short.trim_end_matches("...")));
    }

    #[test]
    fn demo_queries_are_three_fixed_prompts() {
        assert_eq!(DEMO_QUERIES.len(), 3);
        assert_eq!(DEMO_QUERIES[0].1, "royal blue sharara suit");
    }
}
