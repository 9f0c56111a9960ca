use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;

/// Body of `POST /evaluate`.
///
/// URLs arrive as plain strings and are checked by [`EvaluationRequest::validate`]
/// so a bad URL yields a 422 with a readable `detail` instead of a serde error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub agent_card_url: String,
    #[serde(default)]
    pub chat_url: Option<String>,
}

impl EvaluationRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_http_url("agent_card_url", &self.agent_card_url)?;
        if let Some(ref chat_url) = self.chat_url {
            validate_http_url("chat_url", chat_url)?;
        }
        Ok(())
    }
}

fn validate_http_url(field: &str, raw: &str) -> Result<(), ApiError> {
    let url = reqwest::Url::parse(raw)
        .map_err(|e| ApiError::Validation(format!("{}: invalid URL '{}': {}", field, raw, e)))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(()),
        "http" | "https" => Err(ApiError::Validation(format!("{}: URL has no host", field))),
        scheme => Err(ApiError::Validation(format!(
            "{}: URL scheme should be 'http' or 'https', got '{}'",
            field, scheme
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl EvaluationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvaluationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("Unknown evaluation status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpCompliance {
    pub spec_alignment: f64,
    pub tools_schema_valid: f64,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyMetrics {
    pub toxicity: f64,
    pub compliance: f64,
    pub harmfulness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatbotMetrics {
    pub relevance: f64,
    pub helpfulness: f64,
    pub factuality: f64,
    /// Milliseconds.
    pub latency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub mcp_compliance: McpCompliance,
    pub safety: SafetyMetrics,
    pub chatbot: ChatbotMetrics,
}

/// A stored evaluation (table `evaluation`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: String,
    pub agent_card_url: String,
    pub chat_url: Option<String>,
    pub status: EvaluationStatus,
    pub metrics: Option<Metrics>,
    pub html_report: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Response of a successful `POST /evaluate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub id: String,
    pub status: EvaluationStatus,
    pub metrics: Metrics,
}
