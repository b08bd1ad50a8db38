mod anomaly;
mod classify;
mod config;
mod dedupe;
mod fields;
mod intake;
mod pipeline;
mod summary;
mod tracking;

use config::Config;
use dedupe::DuplicateTracker;
use intake::DocumentMeta;
use std::io::Read;
use std::path::Path;
use summary::{CompletionBackend, OpenAiChat};
use tracing::info;

const CONFIG_PATH: &str = ".config/invoice_audit.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter("info")
        .init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("analyze") if args.len() > 2 => analyze(&args[2..]).await,
        Some("extract") if args.len() == 3 => extract(&args[2]),
        Some("classify") if args.len() == 3 => classify(&args[2]),
        _ => {
            eprintln!("Usage: invoice_audit <command>");
            eprintln!("  analyze <file>...   full pipeline, one JSON report per document");
            eprintln!("                      (use '-' to read a single document from stdin)");
            eprintln!("  extract <file>      structured fields only");
            eprintln!("  classify <file>     document type only");
            Ok(())
        }
    }
}

/// Run the full pipeline over each document, sharing one duplicate tracker
/// across the batch.
async fn analyze(paths: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load_or_default(CONFIG_PATH);
    let tracker = DuplicateTracker::new();
    let backend = OpenAiChat::from_config(&cfg.llm);
    let backend = backend.as_ref().map(|b| b as &dyn CompletionBackend);

    for path in paths {
        let (text, meta) = load(path)?;
        let report = pipeline::analyze_text(&text, meta, &cfg, &tracker, None, backend).await;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    info!(
        documents = paths.len(),
        fingerprints = tracker.len(),
        "Batch complete"
    );
    Ok(())
}

fn extract(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (text, _meta) = load(path)?;
    let extracted = fields::extract_fields(&text);
    let (filled, total) = extracted.coverage();
    info!(filled, total, "Heuristic coverage");
    println!("{}", serde_json::to_string_pretty(&extracted)?);
    Ok(())
}

fn classify(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (text, _meta) = load(path)?;
    let classification = classify::classify_document(&text, None);
    println!("{}", serde_json::to_string_pretty(&classification)?);
    Ok(())
}

fn load(path: &str) -> Result<(String, DocumentMeta), Box<dyn std::error::Error>> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        let meta = DocumentMeta::for_text("stdin", &text);
        return Ok((text, meta));
    }
    intake::read_document(Path::new(path))
}
