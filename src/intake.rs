// src/intake.rs

use serde::Serialize;
use std::{fs, path::Path};
use tracing::info;

/// Extensions we accept as already-OCR'd text. Image/PDF OCR happens
/// upstream of this tool.
const SUPPORTED_TYPES: [&str; 4] = ["txt", "text", "md", "ocr"];

/// Metadata reported alongside the document text.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentMeta {
    pub file_name: String,
    pub file_type: String,
    pub page_count: usize,
    pub size_bytes: u64,
}

impl DocumentMeta {
    /// Metadata for text that did not come from a file (stdin, tests).
    pub fn for_text(name: &str, text: &str) -> Self {
        Self {
            file_name: name.to_string(),
            file_type: "text".to_string(),
            page_count: page_count(text),
            size_bytes: text.len() as u64,
        }
    }
}

/// Load one document. Errors on a missing file or an extension outside the
/// supported text types; everything past this boundary is infallible.
pub fn read_document(path: &Path) -> Result<(String, DocumentMeta), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("file not found: {}", path.display()).into());
    }

    let file_type = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if !SUPPORTED_TYPES.contains(&file_type.as_str()) {
        return Err(format!(
            "unsupported file type '{file_type}': {} (expected one of {SUPPORTED_TYPES:?})",
            path.display()
        )
        .into());
    }

    let text = fs::read_to_string(path)?;
    let meta = DocumentMeta {
        file_name: path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string(),
        file_type,
        page_count: page_count(&text),
        size_bytes: fs::metadata(path)?.len(),
    };

    info!(
        file = %meta.file_name,
        pages = meta.page_count,
        bytes = meta.size_bytes,
        "Document loaded"
    );
    Ok((text, meta))
}

/// OCR output separates pages with form feeds.
fn page_count(text: &str) -> usize {
    text.matches('\u{c}').count() + 1
}
