use crate::models::{Evaluation, EvaluationStatus, Metrics};

/// The fields a report is rendered from.
pub struct ReportView<'a> {
    pub status: EvaluationStatus,
    pub agent_card_url: &'a str,
    pub chat_url: Option<&'a str>,
    pub metrics: Option<&'a Metrics>,
}

impl<'a> From<&'a Evaluation> for ReportView<'a> {
    fn from(e: &'a Evaluation) -> Self {
        ReportView {
            status: e.status,
            agent_card_url: &e.agent_card_url,
            chat_url: e.chat_url.as_deref(),
            metrics: e.metrics.as_ref(),
        }
    }
}

const STYLE: &str = r#"
          body { font-family: ui-sans-serif, system-ui, -apple-system; padding: 24px; background: #0b1020; color: #e6f0ff; }
          .card { background: #0f172a; border: 1px solid #1f2a44; border-radius: 12px; padding: 20px; max-width: 960px; margin: 0 auto; }
          h1 { font-size: 24px; margin: 0 0 12px; }
          h2 { font-size: 18px; margin: 20px 0 8px; color: #9fb3ff; }
          table { width: 100%; border-collapse: collapse; margin-top: 8px; }
          tr:nth-child(even) td { background: #0b132b; }
          td { border-top: 1px solid #1f2a44; }
          .muted { color: #9fb3ff; }
"#;

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Numbers keep at least one decimal: `0.5`, `1.0`, `123.0`.
fn format_score(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

fn row(label: &str, value: Option<f64>) -> String {
    let value = value.map(format_score).unwrap_or_else(|| "n/a".to_string());
    format!(
        "<tr><td style='padding:8px;font-weight:600'>{}</td><td style='padding:8px'>{}</td></tr>",
        label, value
    )
}

fn section(title: &str, rows: &[(&str, Option<f64>)]) -> String {
    let body: Vec<String> = rows.iter().map(|(label, v)| row(label, *v)).collect();
    format!(
        "\n          <h2>{}</h2>\n          <table>\n            {}\n          </table>\n",
        title,
        body.join("\n            ")
    )
}

pub fn render_html_report(view: &ReportView<'_>) -> String {
    let m = view.metrics;
    let mcp = m.map(|m| &m.mcp_compliance);
    let safety = m.map(|m| &m.safety);
    let bot = m.map(|m| &m.chatbot);

    let chat = view
        .chat_url
        .filter(|u| !u.is_empty())
        .map(escape_html)
        .unwrap_or_else(|| "—".to_string());

    let mut html = String::new();
    html.push_str("<html>\n  <head>\n");
    html.push_str("    <meta charset='utf-8' />\n");
    html.push_str("    <meta name='viewport' content='width=device-width, initial-scale=1' />\n");
    html.push_str("    <title>Agent Evaluator Report</title>\n");
    html.push_str("    <style>");
    html.push_str(STYLE);
    html.push_str("    </style>\n  </head>\n  <body>\n    <div class='card'>\n");
    html.push_str("      <h1>Agent Evaluator Report</h1>\n");
    html.push_str(&format!("      <div class='muted'>Status: {}</div>\n", view.status));
    html.push_str(&format!(
        "      <div class='muted'>Agent Card: {}</div>\n",
        escape_html(view.agent_card_url)
    ));
    html.push_str(&format!("      <div class='muted'>Chat Logs: {}</div>\n", chat));

    html.push_str(&section(
        "MCP Compliance",
        &[
            ("Spec Alignment", mcp.map(|x| x.spec_alignment)),
            ("Tools Schema Valid", mcp.map(|x| x.tools_schema_valid)),
        ],
    ));
    html.push_str(&section(
        "Safety",
        &[
            ("Toxicity", safety.map(|x| x.toxicity)),
            ("Compliance", safety.map(|x| x.compliance)),
            ("Harmfulness", safety.map(|x| x.harmfulness)),
        ],
    ));
    html.push_str(&section(
        "Chatbot Metrics",
        &[
            ("Relevance", bot.map(|x| x.relevance)),
            ("Helpfulness", bot.map(|x| x.helpfulness)),
            ("Factuality", bot.map(|x| x.factuality)),
            ("Latency (ms)", bot.map(|x| x.latency)),
        ],
    ));

    html.push_str("    </div>\n  </body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics;

    #[test]
    fn test_report_contains_metrics() {
        let m = metrics::score(&"a".repeat(250), None);
        let html = render_html_report(&ReportView {
            status: EvaluationStatus::Completed,
            agent_card_url: "https://example.com/card.json",
            chat_url: None,
            metrics: Some(&m),
        });

        assert!(html.contains("<title>Agent Evaluator Report</title>"));
        assert!(html.contains("Status: completed"));
        assert!(html.contains("Agent Card: https://example.com/card.json"));
        assert!(html.contains("Chat Logs: —"));
        assert!(html.contains("<h2>MCP Compliance</h2>"));
        assert!(html.contains("<h2>Safety</h2>"));
        assert!(html.contains("<h2>Chatbot Metrics</h2>"));
        assert!(html.contains("<td style='padding:8px'>0.5</td>"));
        assert!(html.contains("<td style='padding:8px'>100.0</td>"));
        assert!(!html.contains("n/a"));
    }

    #[test]
    fn test_report_without_metrics() {
        let html = render_html_report(&ReportView {
            status: EvaluationStatus::Failed,
            agent_card_url: "https://example.com/card.json",
            chat_url: Some("https://example.com/chat.txt"),
            metrics: None,
        });

        assert!(html.contains("Status: failed"));
        assert!(html.contains("Chat Logs: https://example.com/chat.txt"));
        assert_eq!(html.matches("n/a").count(), 9);
    }

    #[test]
    fn test_report_escapes_urls() {
        let html = render_html_report(&ReportView {
            status: EvaluationStatus::Running,
            agent_card_url: "https://example.com/?q=<script>",
            chat_url: None,
            metrics: None,
        });
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(1.0), "1.0");
        assert_eq!(format_score(0.0), "0.0");
        assert_eq!(format_score(0.42), "0.42");
        assert_eq!(format_score(123.0), "123.0");
    }
}
