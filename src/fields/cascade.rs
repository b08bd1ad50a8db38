use super::{ExtractedFields, LineItem};
use chrono::NaiveDate;
use regex::Regex;

/// Grand-total label patterns, most specific first. The first pattern that
/// matches wins; its capture is then parsed (or discarded as unparseable),
/// without falling through to the looser patterns.
const TOTAL_PATTERNS: [&str; 7] = [
    r"(?i)\bTotal\s*(?:Amount)?[:\s]*([0-9.,]+)",
    r"(?i)\b(?:Grand\s*)?Total[:\s]*([0-9.,]+)",
    r"(?i)\bAmount\s*Due[:\s]*([0-9.,]+)",
    r"(?i)\bNet\s*Amount[:\s]*([0-9.,]+)",
    r"(?i)\bBalance\s*(?:Due)?[:\s]*([0-9.,]+)",
    r"(?i)(?:Total|Amount)[:\s]*[$€£₹\s]*([0-9,]+\.?[0-9]*)",
    r"(?im)[$€£₹]\s*([0-9,]+\.?[0-9]*)\s*$",
];

/// Date patterns, tried in order: labeled day/month-first numeric, labeled
/// year-first numeric, then any bare numeric date.
const DATE_PATTERNS: [&str; 3] = [
    r"(?i)(?:Date|Invoice\s*Date|Due\s*Date)[:\s]*(\d{1,2}[/\-]\d{1,2}[/\-]\d{2,4})",
    r"(?i)Date[:\s]*(\d{4}[/\-]\d{1,2}[/\-]\d{1,2})",
    r"\b(\d{1,2}[/\-]\d{1,2}[/\-]\d{2,4}|\d{4}[/\-]\d{1,2}[/\-]\d{1,2})\b",
];

/// Normalization formats, tried in order. Day-first is tried before
/// month-first, so an ambiguous `03/04/2024` resolves day-first.
/// Known limitation; locale inference is deliberately not attempted.
const DATE_FORMATS: [&str; 7] = [
    "%d/%m/%Y", "%m/%d/%Y", "%Y-%m-%d", "%d-%m-%Y", "%m-%d-%Y", "%d/%m/%y", "%m/%d/%y",
];

/// Main extraction entry point — an ordered cascade of keyword-anchored
/// regex heuristics, first successful match wins per field.
pub fn extract(text: &str) -> ExtractedFields {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let line_items = extract_line_items(&lines);
    let mut total = extract_total(text);
    if total.is_none() && !line_items.is_empty() {
        total = Some(round2(line_items.iter().map(|li| li.amount).sum()));
    }

    ExtractedFields {
        vendor: extract_vendor(text, &lines),
        invoice_number: extract_invoice_number(text),
        date: extract_date(text),
        currency: extract_currency(text),
        subtotal: extract_amount(r"(?i)\bSubtotal[:\s]*([0-9.,]+)", text),
        tax: extract_amount(r"(?i)\b(?:Tax|VAT|GST)[:\s]*([0-9.,]+)", text),
        total,
        line_items,
    }
}

/// First capture group of `pattern` in `text`, trimmed.
fn first_capture(pattern: &str, text: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.captures(text).map(|c| c[1].trim().to_string())
}

// ---------------------------------------------------------------------------
// Scalar field extractors
// ---------------------------------------------------------------------------

fn extract_vendor(text: &str, lines: &[&str]) -> Option<String> {
    // Explicit sender label first.
    if let Some(cand) = first_capture(
        r"(?i)(?:From|Vendor|Bill\s*From|Sold\s*By)[:\s]+([^\n]+)",
        text,
    ) {
        let len = cand.chars().count();
        if len > 2 && len < 80 {
            return Some(cand);
        }
    }

    // No usable label: the vendor is usually one of the first few lines.
    // Skip anything that is purely numeric/currency/date-like or opens with
    // a known field keyword.
    let numeric_like = Regex::new(r"^[\d\s/\-.$€£]+$").ok()?;
    let keyword = Regex::new(r"(?i)^(?:Invoice|Date|Total|Subtotal|Tax)").ok()?;
    for line in lines.iter().take(5) {
        if numeric_like.is_match(line) || keyword.is_match(line) {
            continue;
        }
        let len = line.chars().count();
        if len > 2 && len < 80 {
            return Some((*line).to_string());
        }
    }

    lines.first().map(|l| (*l).to_string())
}

fn extract_invoice_number(text: &str) -> Option<String> {
    let raw = first_capture(
        r"(?i)(?:Invoice\s*#?|Inv\s*No\.?|Invoice\s*Number|Ref\s*#?|ID\s*#?)\s*[:\s]*([A-Za-z0-9\-/]+)",
        text,
    )
    .or_else(|| first_capture(r"\b([A-Z]{2,5}[\-\s]?\d{4,})\b", text))?;

    // The label word itself gets captured when the value sits on another
    // line; treat that as no match.
    match raw.to_lowercase().as_str() {
        "invoice" | "number" | "no" => None,
        _ => Some(raw),
    }
}

fn extract_date(text: &str) -> Option<String> {
    let raw = DATE_PATTERNS.iter().find_map(|p| first_capture(p, text))?;
    Some(normalize_date(&raw).unwrap_or(raw))
}

/// Try each known format in order; first parse wins, rendered as ISO-8601.
/// `None` when no format parses — the caller keeps the raw substring.
fn normalize_date(raw: &str) -> Option<String> {
    // chrono's %Y happily parses short years, so the four-digit formats only
    // apply when the string actually carries a four-digit component.
    let four_digit_year = raw.split(['/', '-']).any(|part| part.len() == 4);
    DATE_FORMATS
        .iter()
        .filter(|fmt| !fmt.contains("%Y") || four_digit_year)
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn extract_currency(text: &str) -> Option<String> {
    first_capture(r"(\$|€|£|₹|INR|USD|EUR|GBP)", text)
}

fn extract_amount(pattern: &str, text: &str) -> Option<f64> {
    parse_amount(&first_capture(pattern, text)?)
}

fn extract_total(text: &str) -> Option<f64> {
    let raw = TOTAL_PATTERNS.iter().find_map(|p| first_capture(p, text))?;
    parse_amount(&raw)
}

/// Strip everything but digits, dot, comma, minus, drop the thousands
/// commas, then parse. Unparseable values are simply absent.
fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    cleaned.replace(',', "").parse().ok()
}

// ---------------------------------------------------------------------------
// Line items
// ---------------------------------------------------------------------------

fn extract_line_items(lines: &[&str]) -> Vec<LineItem> {
    let Ok(item_re) = Regex::new(r"(.+?)\s+([$€£₹]?\s*[0-9,]+\.?[0-9]{0,2})\s*$") else {
        return Vec::new();
    };
    // Monetary label lines (Subtotal: 90.00, Total: 100.00, ...) would parse
    // as description+amount and inflate the line-item sum against the stated
    // total. Other false positives (a "Date: 2024" line) are kept.
    let Ok(label_re) = Regex::new(
        r"(?i)^(?:subtotal|grand\s*total|total|tax|vat|gst|amount\s*due|net\s*amount|balance|amount)\b",
    ) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    for line in lines {
        if label_re.is_match(line) {
            continue;
        }
        let Some(cap) = item_re.captures(line) else {
            continue;
        };
        let description = cap[1].trim();
        if description.is_empty() {
            continue;
        }
        if let Some(amount) = parse_amount(&cap[2]) {
            items.push(LineItem {
                description: description.to_string(),
                amount,
            });
        }
    }
    items
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
