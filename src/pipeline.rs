// src/pipeline.rs

use crate::anomaly::{self, Anomaly};
use crate::classify::{self, DocumentType, ScoredClassifier};
use crate::config::Config;
use crate::dedupe::DuplicateTracker;
use crate::fields::{self, ExtractedFields};
use crate::intake::DocumentMeta;
use crate::summary::{self, CompletionBackend};
use crate::tracking::RunTracker;
use serde::Serialize;
use tracing::info;

/// Everything downstream consumers get for one document.
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub document_type: DocumentType,
    pub classification_confidence: f64,
    pub meta: DocumentMeta,
    pub fields: ExtractedFields,
    pub anomalies: Vec<Anomaly>,
    pub summary: String,
}

/// Full pipeline over one document's text: extract, classify, audit,
/// summarize, track. The tracker is shared across calls; everything else
/// operates on this call's input alone.
pub async fn analyze_text(
    text: &str,
    meta: DocumentMeta,
    cfg: &Config,
    tracker: &DuplicateTracker,
    model: Option<&dyn ScoredClassifier>,
    backend: Option<&dyn CompletionBackend>,
) -> AnalysisReport {
    let extracted = fields::extract_fields(text);
    let (filled, total) = extracted.coverage();
    info!(
        file = %meta.file_name,
        filled,
        total,
        vendor = ?extracted.vendor,
        invoice_number = ?extracted.invoice_number,
        total_amount = ?extracted.total,
        line_items = extracted.line_items.len(),
        "Extraction result"
    );

    let classification = classify::classify_document(text, model);
    let anomalies = anomaly::detect_anomalies(&extracted, cfg.detection.required, Some(tracker));
    info!(
        file = %meta.file_name,
        doc_type = classification.doc_type.as_str(),
        confidence = classification.confidence,
        anomalies = anomalies.len(),
        "Audit result"
    );

    let summary = summary::generate_summary(backend, &extracted, &anomalies)
        .await
        .resolve(&extracted, &anomalies);

    let mut run = RunTracker::start(&cfg.experiment, &format!("process-{}", meta.file_name));
    run.log_param("doc_type", classification.doc_type.as_str());
    run.log_metric("classification_confidence", classification.confidence);
    run.log_metric("anomaly_count", anomalies.len() as f64);
    run.log_metric("total_amount", extracted.total.unwrap_or(0.0));
    run.finish();

    AnalysisReport {
        document_type: classification.doc_type,
        classification_confidence: classification.confidence,
        meta,
        fields: extracted,
        anomalies,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(text: &str, cfg: &Config, tracker: &DuplicateTracker) -> AnalysisReport {
        analyze_text(
            text,
            DocumentMeta::for_text("test.txt", text),
            cfg,
            tracker,
            None,
            None,
        )
        .await
    }

    fn codes(report: &AnalysisReport) -> Vec<&str> {
        report.anomalies.iter().map(|a| a.code.as_str()).collect()
    }

    #[tokio::test]
    async fn basic_invoice_is_clean() {
        let text = "ACME Corp\nInvoice #INV-1001\nDate: 01/10/2024\nSubtotal: 90.00\nTax: 10.00\nTotal: 100.00\n\nConsulting services 100.00";
        let report = run(text, &Config::default(), &DuplicateTracker::new()).await;

        assert_eq!(report.document_type, DocumentType::Invoice);
        assert_eq!(report.fields.vendor.as_deref(), Some("ACME Corp"));
        assert_eq!(report.fields.total, Some(100.0));
        assert!(!codes(&report).contains(&"total_mismatch"));
        assert!(!report.summary.is_empty());
    }

    #[tokio::test]
    async fn mismatched_totals_are_flagged() {
        let text = "Tech Vendor\nInvoice #TV-1\nDate: 04/10/2024\nSubtotal: 50.00\nTax: 5.00\nTotal: 40.00\n\nSubscription 55.00";
        let report = run(text, &Config::default(), &DuplicateTracker::new()).await;
        assert!(codes(&report).contains(&"total_mismatch"));
    }

    #[tokio::test]
    async fn missing_total_is_flagged() {
        let text = "Vendor Co\nInvoice #123\nDate: 03/10/2024";
        let report = run(text, &Config::default(), &DuplicateTracker::new()).await;
        assert!(codes(&report).contains(&"missing_total"));
    }

    #[tokio::test]
    async fn second_pass_detects_duplicate() {
        let text = "Vendor X\nInvoice #DX-9\nDate: 05/10/2024\nTotal: 80.00\n\nService 80.00";
        let cfg = Config::default();
        let tracker = DuplicateTracker::new();

        let first = run(text, &cfg, &tracker).await;
        assert!(!codes(&first).contains(&"possible_duplicate"));

        let second = run(text, &cfg, &tracker).await;
        assert!(codes(&second).contains(&"possible_duplicate"));
    }

    #[tokio::test]
    async fn report_serializes_with_expected_keys() {
        let text = "Coffee Shop\nReceipt\nDate: 02/10/2024\nTotal: 5.50\n\nLatte 5.50";
        let report = run(text, &Config::default(), &DuplicateTracker::new()).await;
        assert_eq!(report.document_type, DocumentType::ExpenseReceipt);

        let value = serde_json::to_value(&report).unwrap();
        for key in [
            "document_type",
            "classification_confidence",
            "meta",
            "fields",
            "anomalies",
            "summary",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        let fields = value.get("fields").unwrap();
        for key in [
            "vendor",
            "invoice_number",
            "date",
            "currency",
            "subtotal",
            "tax",
            "total",
            "line_items",
        ] {
            assert!(fields.get(key).is_some(), "missing field key {key}");
        }
        assert_eq!(value["document_type"], "expense_receipt");
        assert_eq!(fields["total"], 5.5);
    }
}
