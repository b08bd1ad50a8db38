// src/summary.rs

use crate::anomaly::Anomaly;
use crate::config::{LlmBackend, LlmSection};
use crate::fields::ExtractedFields;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = "You are a helpful financial analyst assistant.";

/// Outcome of summary generation. `Unavailable` is an expected state, not
/// an error: the pipeline resolves it with the pure fallback text.
#[derive(Debug, PartialEq)]
pub enum Summary {
    Generated(String),
    Unavailable,
}

impl Summary {
    /// The final summary text, built from the same structured fields the
    /// backend saw when no generated text is available.
    pub fn resolve(self, fields: &ExtractedFields, anomalies: &[Anomaly]) -> String {
        match self {
            Summary::Generated(text) => text,
            Summary::Unavailable => fallback_summary(fields, anomalies),
        }
    }
}

/// The review prompt handed to the model. Pure function of the structured
/// fields and findings.
pub fn build_summary_prompt(fields: &ExtractedFields, anomalies: &[Anomaly]) -> String {
    let currency = fields.currency.as_deref().unwrap_or("");
    let total = fields
        .total
        .map(|t| t.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut lines = vec![
        "You are an assistant helping a finance team review invoices and expense receipts."
            .to_string(),
        "Summarize the following document in clear business language.".to_string(),
        String::new(),
        format!("Vendor: {}", fields.vendor.as_deref().unwrap_or("unknown")),
        format!("Date: {}", fields.date.as_deref().unwrap_or("unknown")),
        format!("Total: {total} {currency}").trim_end().to_string(),
        String::new(),
        "Line items:".to_string(),
    ];
    for item in &fields.line_items {
        lines.push(
            format!("- {}: {} {currency}", item.description, item.amount)
                .trim_end()
                .to_string(),
        );
    }

    if !anomalies.is_empty() {
        lines.push(String::new());
        lines.push("Potential issues detected:".to_string());
        for a in anomalies {
            lines.push(format!("- ({}) {}", a.severity.as_str(), a.message));
        }
    }

    lines.push(String::new());
    lines.push(
        "Produce:\n\
         1) A 2-3 sentence explanation of the expense.\n\
         2) Briefly call out any unusual or high-risk charges.\n\
         3) Keep it under 150 words."
            .to_string(),
    );
    lines.join("\n")
}

/// Canned summary used whenever no backend text is available. Pure function,
/// independent of why the backend was unavailable.
pub fn fallback_summary(fields: &ExtractedFields, anomalies: &[Anomaly]) -> String {
    let vendor = fields.vendor.as_deref().unwrap_or("Unknown vendor");
    let currency = fields.currency.as_deref().unwrap_or("");
    let total = fields
        .total
        .map(|t| t.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let mut base = format!("Invoice/expense from {vendor} with total {total} {currency}")
        .trim_end()
        .to_string();
    base.push('.');
    if !anomalies.is_empty() {
        base.push_str(" Potential issues were detected; please review the anomaly list.");
    }
    base
}

/// Seam to the text-generation collaborator.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        user: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

/// Generate a summary through the backend, degrading to `Unavailable` on
/// any failure (or when no backend is configured).
pub async fn generate_summary(
    backend: Option<&dyn CompletionBackend>,
    fields: &ExtractedFields,
    anomalies: &[Anomaly],
) -> Summary {
    let Some(backend) = backend else {
        return Summary::Unavailable;
    };
    let prompt = build_summary_prompt(fields, anomalies);
    match backend.complete(SYSTEM_PROMPT, &prompt).await {
        Ok(text) => Summary::Generated(text),
        Err(e) => {
            warn!(error = %e, "Summary generation failed");
            Summary::Unavailable
        }
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible chat backend
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Chat-completions client for Ollama or a remote OpenAI-compatible API.
pub struct OpenAiChat {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiChat {
    /// Resolve the configured backend into a concrete client. `None` when
    /// summaries are disabled or the remote key is not set.
    pub fn from_config(llm: &LlmSection) -> Option<Self> {
        match llm.backend {
            LlmBackend::Disabled => None,
            LlmBackend::Ollama => {
                info!(
                    url = %llm.ollama.base_url,
                    model = %llm.ollama.model,
                    "Using Ollama (local) summary backend"
                );
                // Ollama requires a key header but ignores its value.
                Some(Self::new(&llm.ollama.base_url, &llm.ollama.model, "ollama"))
            }
            LlmBackend::Remote => match std::env::var("LLM_API_KEY") {
                Ok(key) => {
                    info!(
                        url = %llm.remote.base_url,
                        model = %llm.remote.model,
                        "Using remote summary backend"
                    );
                    Some(Self::new(&llm.remote.base_url, &llm.remote.model, &key))
                }
                Err(_) => {
                    warn!("LLM_API_KEY not set, summary backend disabled");
                    None
                }
            },
        }
    }

    fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiChat {
    async fn complete(
        &self,
        system: &str,
        user: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: 0.2,
            max_tokens: 300,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("summary API error {status}: {body}").into());
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or("empty response from model")?;
        Ok(content)
    }
}
