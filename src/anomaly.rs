// src/anomaly.rs

use crate::dedupe::DuplicateTracker;
use crate::fields::ExtractedFields;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashSet;

/// Qualitative anomaly priority. No numeric weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// One data-quality finding. A value object: stable machine-readable code,
/// human-readable message (may embed the offending values), severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub code: String,
    pub message: String,
    pub severity: Severity,
}

impl Anomaly {
    fn new(code: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity,
        }
    }
}

/// Which fields the missing-field check demands. `Reduced` drops the
/// invoice-number requirement for receipt-heavy workloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredFields {
    #[default]
    Full,
    Reduced,
}

/// Run every check against the extracted fields, in a fixed order so the
/// output is deterministic. Each check is independent and contributes zero
/// or more findings. The tracker, when supplied, backs the cross-document
/// duplicate check and is the only side effect.
pub fn detect_anomalies(
    fields: &ExtractedFields,
    required: RequiredFields,
    tracker: Option<&DuplicateTracker>,
) -> Vec<Anomaly> {
    let mut anomalies = check_missing_fields(fields, required);
    anomalies.extend(check_total_vs_line_items(fields));
    anomalies.extend(check_subtotal_tax_total(fields));
    anomalies.extend(check_date_future(fields));
    anomalies.extend(check_negative_amounts(fields));
    anomalies.extend(check_duplicate_line_items(fields));
    anomalies.extend(check_empty_line_items_with_total(fields));
    anomalies.extend(check_tax_rate_sanity(fields));

    if let Some(tracker) = tracker {
        anomalies.extend(tracker.check(fields));
    }

    anomalies
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}

fn check_missing_fields(fields: &ExtractedFields, required: RequiredFields) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    let mut flag = |name: &str, message: &str| {
        anomalies.push(Anomaly::new(format!("missing_{name}"), message, Severity::High));
    };

    if is_blank(&fields.vendor) {
        flag("vendor", "Vendor name is missing");
    }
    if required == RequiredFields::Full && is_blank(&fields.invoice_number) {
        flag("invoice_number", "Invoice number is missing");
    }
    if is_blank(&fields.date) {
        flag("date", "Invoice date is missing");
    }
    if fields.total.is_none_or(|t| t == 0.0) {
        flag("total", "Total amount is missing");
    }
    anomalies
}

fn check_total_vs_line_items(fields: &ExtractedFields) -> Vec<Anomaly> {
    let Some(total) = fields.total else {
        return Vec::new();
    };
    if fields.line_items.is_empty() {
        return Vec::new();
    }
    let line_sum: f64 = fields.line_items.iter().map(|li| li.amount).sum();
    if line_sum == 0.0 {
        return Vec::new();
    }
    let diff = (line_sum - total).abs();
    // Relative bound plus an absolute floor, so small-dollar documents do
    // not trip on rounding noise.
    if diff > 0.01 * line_sum && diff > 1.0 {
        return vec![Anomaly::new(
            "total_mismatch",
            format!(
                "Total ({total}) does not match sum of line items ({line_sum:.2}). Difference: {diff:.2}."
            ),
            Severity::High,
        )];
    }
    Vec::new()
}

fn check_subtotal_tax_total(fields: &ExtractedFields) -> Vec<Anomaly> {
    let (Some(subtotal), Some(total)) = (fields.subtotal, fields.total) else {
        return Vec::new();
    };
    if let Some(tax) = fields.tax {
        let expected = subtotal + tax;
        let diff = (expected - total).abs();
        if diff > 0.02 * total && diff > 1.0 {
            return vec![Anomaly::new(
                "subtotal_tax_mismatch",
                format!(
                    "Subtotal ({subtotal}) + Tax ({tax}) = {expected:.2}, but Total is {total}."
                ),
                Severity::High,
            )];
        }
    } else {
        let diff = (subtotal - total).abs();
        if diff > 0.02 * total && diff > 1.0 {
            return vec![Anomaly::new(
                "subtotal_total_mismatch",
                format!(
                    "Subtotal ({subtotal}) does not match Total ({total}). Tax may be missing or incorrect."
                ),
                Severity::Medium,
            )];
        }
    }
    Vec::new()
}

fn check_date_future(fields: &ExtractedFields) -> Vec<Anomaly> {
    let Some(date) = fields.date.as_deref() else {
        return Vec::new();
    };
    // Only the normalized ISO prefix is checked; anything else (raw
    // unnormalized matches, short strings) is silently ignored.
    let Some(head) = date.get(..10) else {
        return Vec::new();
    };
    match NaiveDate::parse_from_str(head, "%Y-%m-%d") {
        Ok(d) if d > Local::now().date_naive() => vec![Anomaly::new(
            "future_date",
            format!("Invoice date ({date}) is in the future. Verify correctness."),
            Severity::Medium,
        )],
        _ => Vec::new(),
    }
}

fn check_negative_amounts(fields: &ExtractedFields) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    if fields.total.is_some_and(|t| t < 0.0) {
        anomalies.push(Anomaly::new(
            "negative_total",
            "Total amount is negative (credit/refund). Confirm this is expected.",
            Severity::Medium,
        ));
    }
    if fields.tax.is_some_and(|t| t < 0.0) {
        anomalies.push(Anomaly::new(
            "negative_tax",
            "Tax amount is negative. Verify.",
            Severity::High,
        ));
    }
    for item in &fields.line_items {
        if item.amount < 0.0 {
            let mut desc: String = item.description.chars().take(40).collect();
            if item.description.chars().count() > 40 {
                desc.push_str("...");
            }
            anomalies.push(Anomaly::new(
                "negative_line_item",
                format!("Line item '{desc}' has negative amount: {}.", item.amount),
                Severity::Medium,
            ));
        }
    }
    anomalies
}

fn check_duplicate_line_items(fields: &ExtractedFields) -> Vec<Anomaly> {
    if fields.line_items.len() < 2 {
        return Vec::new();
    }
    let mut anomalies = Vec::new();
    let mut seen = HashSet::new();
    for item in &fields.line_items {
        // Per-document key: normalized description plus 2dp-rounded amount.
        // Deliberately coarser than the cross-document fingerprint, which
        // compares exact totals.
        let key = format!("{}|{:.2}", item.description.trim().to_lowercase(), item.amount);
        if !seen.insert(key) {
            anomalies.push(Anomaly::new(
                "duplicate_line_item",
                format!(
                    "Duplicate line: '{}' with amount {} appears more than once.",
                    item.description, item.amount
                ),
                Severity::High,
            ));
        }
    }
    anomalies
}

fn check_empty_line_items_with_total(fields: &ExtractedFields) -> Vec<Anomaly> {
    if fields.total.is_some_and(|t| t != 0.0) && fields.line_items.is_empty() {
        return vec![Anomaly::new(
            "no_line_items",
            "Total amount is present but no line items were extracted. Line items may be missing or in an unsupported format.",
            Severity::Medium,
        )];
    }
    Vec::new()
}

fn check_tax_rate_sanity(fields: &ExtractedFields) -> Vec<Anomaly> {
    let (Some(subtotal), Some(tax)) = (fields.subtotal, fields.tax) else {
        return Vec::new();
    };
    if subtotal == 0.0 {
        return Vec::new();
    }
    let rate_pct = tax / subtotal * 100.0;
    if !(0.0..=50.0).contains(&rate_pct) {
        return vec![Anomaly::new(
            "unusual_tax_rate",
            format!(
                "Tax rate appears unusual: {rate_pct:.1}% (tax {tax} on subtotal {subtotal}). Typical rates are 0-30%."
            ),
            Severity::Low,
        )];
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::LineItem;

    fn fields() -> ExtractedFields {
        ExtractedFields {
            vendor: Some("ACME Corp".to_string()),
            invoice_number: Some("INV-1001".to_string()),
            date: Some("2024-10-01".to_string()),
            currency: Some("$".to_string()),
            subtotal: Some(90.0),
            tax: Some(10.0),
            total: Some(100.0),
            line_items: vec![LineItem {
                description: "Consulting services".to_string(),
                amount: 100.0,
            }],
        }
    }

    fn codes(anomalies: &[Anomaly]) -> Vec<&str> {
        anomalies.iter().map(|a| a.code.as_str()).collect()
    }

    #[test]
    fn clean_invoice_has_no_anomalies() {
        let found = detect_anomalies(&fields(), RequiredFields::Full, None);
        assert!(found.is_empty(), "unexpected: {found:?}");
    }

    #[test]
    fn missing_field_completeness() {
        let empty = ExtractedFields::default();
        let found = detect_anomalies(&empty, RequiredFields::Full, None);
        for code in ["missing_vendor", "missing_invoice_number", "missing_date", "missing_total"] {
            assert_eq!(
                found.iter().filter(|a| a.code == code).count(),
                1,
                "expected exactly one {code}"
            );
        }
        assert!(found.iter().all(|a| a.severity == Severity::High));
    }

    #[test]
    fn empty_string_and_zero_count_as_missing() {
        let mut f = fields();
        f.vendor = Some(String::new());
        f.total = Some(0.0);
        f.line_items.clear();
        let found = detect_anomalies(&f, RequiredFields::Full, None);
        let found = codes(&found);
        assert!(found.contains(&"missing_vendor"));
        assert!(found.contains(&"missing_total"));
    }

    #[test]
    fn reduced_set_skips_invoice_number() {
        let empty = ExtractedFields::default();
        let found = detect_anomalies(&empty, RequiredFields::Reduced, None);
        assert!(!codes(&found).contains(&"missing_invoice_number"));
        assert!(codes(&found).contains(&"missing_vendor"));
    }

    #[test]
    fn total_mismatch_threshold_boundary() {
        // diff == max(1% of line_sum, 1.0) must NOT fire; strictly greater must.
        let mut f = fields();
        f.subtotal = None;
        f.tax = None;

        f.line_items[0].amount = 100.0;
        f.total = Some(99.0); // diff 1.0, floor 1.0 — inside
        assert!(check_total_vs_line_items(&f).is_empty());

        f.total = Some(98.9); // diff 1.1 — outside
        assert_eq!(check_total_vs_line_items(&f)[0].code, "total_mismatch");

        // Relative bound dominates on larger sums.
        f.line_items[0].amount = 1000.0;
        f.total = Some(990.0); // diff 10.0 == 1% of 1000 — inside
        assert!(check_total_vs_line_items(&f).is_empty());

        f.total = Some(989.0); // diff 11.0 — outside
        assert_eq!(check_total_vs_line_items(&f)[0].code, "total_mismatch");
    }

    #[test]
    fn total_mismatch_skips_zero_line_sum() {
        let mut f = fields();
        f.line_items = vec![
            LineItem { description: "a".into(), amount: 50.0 },
            LineItem { description: "b".into(), amount: -50.0 },
        ];
        assert!(check_total_vs_line_items(&f).is_empty());
    }

    #[test]
    fn subtotal_tax_mismatch() {
        let mut f = fields();
        f.subtotal = Some(50.0);
        f.tax = Some(5.0);
        f.total = Some(40.0);
        let found = check_subtotal_tax_total(&f);
        assert_eq!(found[0].code, "subtotal_tax_mismatch");
        assert_eq!(found[0].severity, Severity::High);
    }

    #[test]
    fn subtotal_total_mismatch_without_tax() {
        let mut f = fields();
        f.tax = None;
        f.subtotal = Some(50.0);
        f.total = Some(100.0);
        let found = check_subtotal_tax_total(&f);
        assert_eq!(found[0].code, "subtotal_total_mismatch");
        assert_eq!(found[0].severity, Severity::Medium);
    }

    #[test]
    fn future_date_flagged() {
        let mut f = fields();
        f.date = Some("2099-01-01".to_string());
        assert_eq!(check_date_future(&f)[0].code, "future_date");
    }

    #[test]
    fn unparseable_date_ignored() {
        let mut f = fields();
        f.date = Some("13/40/2024".to_string());
        assert!(check_date_future(&f).is_empty());
        f.date = Some("soon".to_string());
        assert!(check_date_future(&f).is_empty());
    }

    #[test]
    fn negative_amounts() {
        let mut f = fields();
        f.total = Some(-10.0);
        f.tax = Some(-1.0);
        f.line_items = vec![LineItem {
            description: "x".repeat(60),
            amount: -2.0,
        }];
        let found = check_negative_amounts(&f);
        assert_eq!(codes(&found), vec!["negative_total", "negative_tax", "negative_line_item"]);
        // Long descriptions are truncated in the message.
        assert!(found[2].message.contains(&format!("{}...", "x".repeat(40))));
    }

    #[test]
    fn duplicate_line_items_by_rounded_amount() {
        let mut f = fields();
        f.line_items = vec![
            LineItem { description: "Widget".into(), amount: 5.004 },
            LineItem { description: "  widget ".into(), amount: 5.001 },
            LineItem { description: "Widget".into(), amount: 7.0 },
        ];
        let found = check_duplicate_line_items(&f);
        // Second entry collides after normalization + 2dp rounding.
        assert_eq!(codes(&found), vec!["duplicate_line_item"]);
    }

    #[test]
    fn no_line_items_with_total() {
        let mut f = fields();
        f.line_items.clear();
        assert_eq!(check_empty_line_items_with_total(&f)[0].code, "no_line_items");
        f.total = Some(0.0);
        assert!(check_empty_line_items_with_total(&f).is_empty());
    }

    #[test]
    fn unusual_tax_rate_bounds() {
        let mut f = fields();
        f.subtotal = Some(100.0);
        f.tax = Some(50.0); // exactly 50% — allowed
        assert!(check_tax_rate_sanity(&f).is_empty());
        f.tax = Some(51.0);
        assert_eq!(check_tax_rate_sanity(&f)[0].code, "unusual_tax_rate");
        f.tax = Some(-1.0);
        assert_eq!(check_tax_rate_sanity(&f)[0].code, "unusual_tax_rate");
        f.subtotal = Some(0.0);
        assert!(check_tax_rate_sanity(&f).is_empty());
    }

    #[test]
    fn check_order_is_stable() {
        let mut f = ExtractedFields::default();
        f.total = Some(50.0);
        f.subtotal = Some(10.0);
        f.tax = Some(30.0);
        let found = detect_anomalies(&f, RequiredFields::Full, None);
        assert_eq!(
            codes(&found),
            vec![
                "missing_vendor",
                "missing_invoice_number",
                "missing_date",
                "subtotal_tax_mismatch",
                "no_line_items",
                "unusual_tax_rate",
            ]
        );
    }
}
