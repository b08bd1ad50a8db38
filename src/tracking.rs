// src/tracking.rs

use std::collections::BTreeMap;
use tracing::info;

/// Per-run experiment record: string params and scalar metrics, emitted as
/// one structured log record when the run finishes. Stands in for an
/// external experiment tracker at the same interface.
#[derive(Debug)]
pub struct RunTracker {
    experiment: String,
    run_name: String,
    params: BTreeMap<String, String>,
    metrics: BTreeMap<String, f64>,
}

impl RunTracker {
    pub fn start(experiment: &str, run_name: &str) -> Self {
        Self {
            experiment: experiment.to_string(),
            run_name: run_name.to_string(),
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn log_param(&mut self, key: &str, value: impl Into<String>) {
        self.params.insert(key.to_string(), value.into());
    }

    pub fn log_metric(&mut self, key: &str, value: f64) {
        self.metrics.insert(key.to_string(), value);
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    /// Emit the run record. Nothing here can fail; losing a record must
    /// never fail the processing pipeline.
    pub fn finish(self) {
        info!(
            experiment = %self.experiment,
            run = %self.run_name,
            params = ?self.params,
            metrics = ?self.metrics,
            "Run finished"
        );
    }
}
