// src/fields/mod.rs

mod cascade;

use serde::Deserialize;
use serde::Serialize;

/// A single billed entry parsed from the document body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    /// May be negative (credit / refund).
    pub amount: f64,
}

/// All structured data we can pull out of one OCR'd document.
///
/// Every scalar is optional: the source text is unstructured and extraction
/// is best-effort, so absence is a normal outcome the rule engine consumes,
/// not an error. Produced once per document and never mutated afterward.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub vendor: Option<String>,
    pub invoice_number: Option<String>,
    /// ISO-8601 `YYYY-MM-DD` when one of the known formats parses,
    /// otherwise the raw matched substring.
    pub date: Option<String>,
    pub currency: Option<String>,
    pub subtotal: Option<f64>,
    pub tax: Option<f64>,
    pub total: Option<f64>,
    pub line_items: Vec<LineItem>,
}

impl ExtractedFields {
    /// How many of the scalar fields were successfully extracted.
    pub fn coverage(&self) -> (usize, usize) {
        let total = 7;
        let filled = [
            self.vendor.is_some(),
            self.invoice_number.is_some(),
            self.date.is_some(),
            self.currency.is_some(),
            self.subtotal.is_some(),
            self.tax.is_some(),
            self.total.is_some(),
        ]
        .iter()
        .filter(|&&v| v)
        .count();
        (filled, total)
    }
}

/// Extract structured fields from raw OCR text. Never fails: when nothing
/// matches, the result is all-`None` with no line items.
pub fn extract_fields(text: &str) -> ExtractedFields {
    cascade::extract(text)
}
