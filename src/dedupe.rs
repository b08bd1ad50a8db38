// src/dedupe.rs

use crate::anomaly::{Anomaly, Severity};
use crate::fields::ExtractedFields;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Remembers which documents have been seen across processing calls.
///
/// The one piece of identity-bearing mutable state in the engine. Callers
/// own the instance lifetime (typically one per process) and pass it by
/// reference into each detection call. The fingerprint set only grows; there
/// is no expiry for the tracker's lifetime.
pub struct DuplicateTracker {
    seen: Mutex<HashSet<String>>,
}

impl DuplicateTracker {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// SHA-256 over `vendor|invoice_number|total`. No fingerprint when any
    /// component is missing, empty, or a zero total — such documents are
    /// never tracked.
    fn fingerprint(fields: &ExtractedFields) -> Option<String> {
        let vendor = fields.vendor.as_deref().filter(|v| !v.is_empty())?;
        let invoice_number = fields.invoice_number.as_deref().filter(|v| !v.is_empty())?;
        let total = fields.total.filter(|t| *t != 0.0)?;

        let mut hasher = Sha256::new();
        hasher.update(vendor.as_bytes());
        hasher.update(b"|");
        hasher.update(invoice_number.as_bytes());
        hasher.update(b"|");
        hasher.update(total.to_string().as_bytes());
        Some(format!("{:x}", hasher.finalize()))
    }

    /// Flag the document if its fingerprint was seen before; record it
    /// either way. Lookup and insert happen under a single lock acquisition,
    /// so two concurrent calls with the same fingerprint cannot both observe
    /// "not present".
    pub fn check(&self, fields: &ExtractedFields) -> Option<Anomaly> {
        let fp = Self::fingerprint(fields)?;
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if seen.insert(fp) {
            None
        } else {
            Some(Anomaly {
                code: "possible_duplicate".to_string(),
                message: "This invoice appears to be a duplicate (same vendor, invoice number, and total)."
                    .to_string(),
                severity: Severity::High,
            })
        }
    }

    /// Number of distinct fingerprints recorded so far.
    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DuplicateTracker {
    fn default() -> Self {
        Self::new()
    }
}
