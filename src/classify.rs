// src/classify.rs

use serde::Deserialize;
use serde::Serialize;

/// Coarse document category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    ExpenseReceipt,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::ExpenseReceipt => "expense_receipt",
            Self::Other => "other",
        }
    }

    /// Model labels outside the known set collapse to `Other`.
    fn from_label(label: &str) -> Self {
        match label {
            "invoice" => Self::Invoice,
            "expense_receipt" => Self::ExpenseReceipt,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentClassification {
    pub doc_type: DocumentType,
    /// In `[0, 1]`.
    pub confidence: f64,
}

/// A trained probabilistic text classifier. Training is out of scope here;
/// this is only the label-selection seam.
pub trait ScoredClassifier {
    /// `(label, probability)` per class.
    fn predict(&self, text: &str) -> Vec<(String, f64)>;
}

/// Classify raw document text. With a model, the argmax class wins and its
/// probability becomes the confidence; without one, a keyword heuristic
/// answers at fixed confidences. The two strategies are mutually exclusive
/// per call.
pub fn classify_document(
    text: &str,
    model: Option<&dyn ScoredClassifier>,
) -> DocumentClassification {
    match model {
        Some(model) => classify_with_model(text, model),
        None => keyword_fallback(text),
    }
}

fn keyword_fallback(text: &str) -> DocumentClassification {
    let lower = text.to_lowercase();
    if lower.contains("invoice")
        && (text.contains('#') || lower.contains("number") || lower.contains("date"))
    {
        return DocumentClassification {
            doc_type: DocumentType::Invoice,
            confidence: 0.7,
        };
    }
    if lower.contains("receipt") || lower.contains("thank you for your purchase") {
        return DocumentClassification {
            doc_type: DocumentType::ExpenseReceipt,
            confidence: 0.7,
        };
    }
    DocumentClassification {
        doc_type: DocumentType::Other,
        confidence: 0.5,
    }
}

fn classify_with_model(text: &str, model: &dyn ScoredClassifier) -> DocumentClassification {
    let scores = model.predict(text);
    let best = scores
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    match best {
        Some((label, confidence)) => DocumentClassification {
            doc_type: DocumentType::from_label(&label),
            confidence,
        },
        // A model that produces no scores tells us nothing.
        None => DocumentClassification {
            doc_type: DocumentType::Other,
            confidence: 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubModel(Vec<(String, f64)>);

    impl ScoredClassifier for StubModel {
        fn predict(&self, _text: &str) -> Vec<(String, f64)> {
            self.0.clone()
        }
    }

    #[test]
    fn keyword_invoice() {
        let c = classify_document("ACME Corp\nInvoice #INV-1001\nDate: 01/10/2024", None);
        assert_eq!(c.doc_type, DocumentType::Invoice);
        assert_eq!(c.confidence, 0.7);
    }

    #[test]
    fn keyword_receipt() {
        let c = classify_document("Coffee Shop\nReceipt\nTotal: 5.50", None);
        assert_eq!(c.doc_type, DocumentType::ExpenseReceipt);
        assert_eq!(c.confidence, 0.7);

        let c = classify_document("Thank you for your purchase!", None);
        assert_eq!(c.doc_type, DocumentType::ExpenseReceipt);
    }

    #[test]
    fn keyword_other() {
        let c = classify_document("Internal memo about a meeting.", None);
        assert_eq!(c.doc_type, DocumentType::Other);
        assert_eq!(c.confidence, 0.5);
    }

    #[test]
    fn invoice_needs_corroborating_keyword() {
        // "invoice" alone, with no #/number/date, is not enough.
        let c = classify_document("invoice", None);
        assert_eq!(c.doc_type, DocumentType::Other);
    }

    #[test]
    fn model_argmax_wins() {
        let model = StubModel(vec![
            ("invoice".to_string(), 0.2),
            ("expense_receipt".to_string(), 0.75),
            ("other".to_string(), 0.05),
        ]);
        let c = classify_document("whatever", Some(&model));
        assert_eq!(c.doc_type, DocumentType::ExpenseReceipt);
        assert_eq!(c.confidence, 0.75);
    }

    #[test]
    fn model_unknown_label_maps_to_other() {
        let model = StubModel(vec![("purchase_order".to_string(), 0.9)]);
        let c = classify_document("whatever", Some(&model));
        assert_eq!(c.doc_type, DocumentType::Other);
        assert_eq!(c.confidence, 0.9);
    }

    #[test]
    fn model_with_no_scores() {
        let model = StubModel(Vec::new());
        let c = classify_document("whatever", Some(&model));
        assert_eq!(c.doc_type, DocumentType::Other);
        assert_eq!(c.confidence, 0.0);
    }
}
