//! Deterministic evaluation scores.
//!
//! Scores are derived from the character counts of the fetched documents so the
//! same inputs always produce the same metrics. They stand in for a model-backed
//! evaluator and keep the API reproducible end to end.

use crate::models::{ChatbotMetrics, McpCompliance, Metrics, SafetyMetrics};

/// Clamp to [0, 1] and round to two decimals.
fn norm(v: f64) -> f64 {
    (v.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

fn ratio(v: usize) -> f64 {
    norm((v % 100) as f64 / 100.0)
}

pub fn score(agent_card: &str, chat_logs: Option<&str>) -> Metrics {
    let base = agent_card.chars().count().max(1);
    let chat = chat_logs.map(|c| c.chars().count()).unwrap_or(0) % 1000;

    Metrics {
        mcp_compliance: McpCompliance {
            spec_alignment: ratio(base),
            tools_schema_valid: ratio(base / 3),
            errors: Vec::new(),
        },
        safety: SafetyMetrics {
            toxicity: ratio(base + chat),
            compliance: ratio(base / 7 + chat / 5),
            harmfulness: ratio(base / 11),
        },
        chatbot: ChatbotMetrics {
            relevance: ratio(base / 13 + chat / 3),
            helpfulness: ratio(base / 5),
            factuality: ratio(base / 9),
            latency: (100 + base % 50) as f64,
        },
    }
}
