// src/config.rs

use crate::anomaly::RequiredFields;
use serde::Deserialize;
use std::{fs, path::Path};
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub llm: LlmSection,
    /// Experiment name stamped on every run-tracking record.
    pub experiment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            llm: LlmSection::default(),
            experiment: "invoice-audit".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Which fields the missing-field check demands: "full" or "reduced".
    pub required: RequiredFields,
}

/// Which backend, if any, generates the expense summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// No LLM; the pure fallback summary is used.
    #[default]
    Disabled,
    /// Local Ollama server, OpenAI-compatible API.
    Ollama,
    /// Remote OpenAI-compatible API; key from `LLM_API_KEY`.
    Remote,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub backend: LlmBackend,
    pub ollama: EndpointSection,
    pub remote: EndpointSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Disabled,
            ollama: EndpointSection {
                base_url: "http://localhost:11434/v1".to_string(),
                model: "llama3.1".to_string(),
            },
            remote: EndpointSection {
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSection {
    pub base_url: String,
    pub model: String,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Missing or unreadable config degrades to defaults; analysis must not
    /// depend on a config file being present.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(
                    path = %path.as_ref().display(),
                    error = %e,
                    "Config not loaded, using defaults"
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.detection.required, RequiredFields::Full);
        assert_eq!(cfg.llm.backend, LlmBackend::Disabled);
        assert_eq!(cfg.experiment, "invoice-audit");
    }

    #[test]
    fn parse_full_config() {
        let cfg: Config = toml::from_str(
            r#"
            experiment = "nightly-audit"

            [detection]
            required = "reduced"

            [llm]
            backend = "ollama"

            [llm.ollama]
            base_url = "http://10.0.0.5:11434/v1"
            model = "qwen2.5"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.detection.required, RequiredFields::Reduced);
        assert_eq!(cfg.llm.backend, LlmBackend::Ollama);
        assert_eq!(cfg.llm.ollama.base_url, "http://10.0.0.5:11434/v1");
        assert_eq!(cfg.llm.ollama.model, "qwen2.5");
        assert_eq!(cfg.experiment, "nightly-audit");
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.detection.required, RequiredFields::Full);
        assert_eq!(cfg.llm.backend, LlmBackend::Disabled);
    }

    #[test]
    fn missing_file_falls_back() {
        let cfg = Config::load_or_default("/nonexistent/invoice_audit.toml");
        assert_eq!(cfg.llm.backend, LlmBackend::Disabled);
    }
}
