//! Plain-text rendering for command output

use std::fmt::Write as _;

use cyberdesk_core::{
    BackendHealth, ConversationRecord, ModelReply, PromptTemplate, SessionStats, StoreStatus,
};

/// Column width for wrapped model output
pub const WRAP_WIDTH: usize = 100;

/// Wrap long lines, keeping existing line breaks
pub fn wrap(text: &str) -> String {
    textwrap::fill(text, textwrap::Options::new(WRAP_WIDTH).break_words(false))
}

/// One stored exchange
pub fn record(record: &ConversationRecord) -> String {
    let mut out = format!(
        "#{} [{}] {} ({})\n",
        record.id,
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.tab_name,
        record.model.as_deref().unwrap_or("unknown model"),
    );
    let _ = writeln!(out, "> {}", record.user_message);
    out.push_str(&wrap(&record.assistant_response));
    out.push('\n');
    out
}

/// Replies from a comparison, one section per model
pub fn comparison(replies: &[ModelReply]) -> String {
    replies
        .iter()
        .map(|reply| {
            format!(
                "=== {} ({} tokens) ===\n{}\n",
                reply.model,
                reply.result.total_tokens,
                wrap(&reply.result.response_text)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Store and session statistics
pub fn status(status: &StoreStatus, sessions: &SessionStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Conversations:      {}", status.total_conversations);
    let _ = writeln!(out, "Last 24 hours:      {}", status.recent_activity);
    let _ = writeln!(out, "Database size:      {:.2} MB", status.database_size_mb());
    let _ = writeln!(
        out,
        "Sessions:           {} ({} active, {:.2} messages avg)",
        sessions.total_sessions, sessions.active_sessions, sessions.average_messages_per_session
    );

    if !status.conversations_by_tab.is_empty() {
        out.push_str("\nBy tab:\n");
        for tab in &status.conversations_by_tab {
            let _ = writeln!(out, "  {:<28} {}", tab.tab_name, tab.count);
        }
    }
    out
}

/// Backend health snapshot
pub fn health(name: &str, health: &BackendHealth) -> String {
    let mut out = if health.healthy {
        format!("{name}: healthy")
    } else {
        format!("{name}: unavailable")
    };
    if let Some(elapsed) = health.response_time {
        let _ = write!(out, " ({} ms)", elapsed.as_millis());
    }
    out.push('\n');
    if let Some(error) = &health.error {
        let _ = writeln!(out, "  error: {error}");
    }
    let _ = writeln!(out, "  models: {}", health.models.len());
    for model in &health.models {
        let _ = writeln!(out, "    {model}");
    }
    out
}

/// Catalog listing
pub fn template_list(templates: &[PromptTemplate]) -> String {
    templates
        .iter()
        .map(|t| format!("{:<28} {}\n", t.tab, t.key))
        .collect()
}

/// Full template with its system prompt and samples
pub fn template_detail(template: &PromptTemplate) -> String {
    let mut out = format!("{} ({})\n\n", template.tab, template.key);
    out.push_str(&template.system_prompt());
    out.push_str("\n\nSample prompts:\n");
    for (i, prompt) in template.test_prompts.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, prompt);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use cyberdesk_core::{GenerationResult, TabCount};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_wrap_keeps_short_lines_and_breaks() {
        assert_eq!(wrap("rule x {\n  condition: true\n}"), "rule x {\n  condition: true\n}");
        let long = "word ".repeat(40);
        assert!(wrap(long.trim()).lines().all(|l| l.len() <= WRAP_WIDTH));
    }

    #[test]
    fn test_record_rendering() {
        let rec = ConversationRecord {
            id: 7,
            tab_name: "YARA Patterns".to_string(),
            timestamp: chrono::Utc.with_ymd_and_hms(2026, 5, 4, 3, 2, 1).unwrap(),
            user_message: "rule please".to_string(),
            assistant_response: "rule a { condition: true }".to_string(),
            system_prompt: None,
            model: Some("m1".to_string()),
            temperature: None,
            max_tokens: None,
            session_id: None,
        };
        assert_eq!(
            record(&rec),
            "#7 [2026-05-04 03:02:01] YARA Patterns (m1)\n> rule please\nrule a { condition: true }\n"
        );
    }

    #[test]
    fn test_comparison_sections() {
        let replies = vec![
            ModelReply {
                model: "a".to_string(),
                result: GenerationResult::success("one", 2, 1),
            },
            ModelReply {
                model: "b".to_string(),
                result: GenerationResult::failure("boom"),
            },
        ];
        assert_eq!(
            comparison(&replies),
            "=== a (3 tokens) ===\none\n\n=== b (0 tokens) ===\nError: boom\n"
        );
    }

    #[test]
    fn test_status_lists_tabs() {
        let store = StoreStatus {
            total_conversations: 3,
            conversations_by_tab: vec![TabCount {
                tab_name: "CREM Predict".to_string(),
                count: 3,
            }],
            recent_activity: 1,
            database_size_bytes: 0,
        };
        let sessions = SessionStats {
            total_sessions: 1,
            active_sessions: 1,
            average_messages_per_session: 3.0,
        };
        let out = status(&store, &sessions);
        assert!(out.starts_with("Conversations:      3\n"));
        assert!(out.contains("1 active, 3.00 messages avg"));
        assert!(out.contains("  CREM Predict"));
    }

    #[test]
    fn test_health_rendering() {
        let down = BackendHealth {
            healthy: false,
            models: Vec::new(),
            error: Some("connection refused".to_string()),
            response_time: None,
        };
        assert_eq!(
            health("Ollama", &down),
            "Ollama: unavailable\n  error: connection refused\n  models: 0\n"
        );

        let up = BackendHealth {
            healthy: true,
            models: vec!["m1".to_string()],
            error: None,
            response_time: Some(Duration::from_millis(12)),
        };
        assert_eq!(health("LM Studio", &up), "LM Studio: healthy (12 ms)\n  models: 1\n    m1\n");
    }

    #[test]
    fn test_template_detail_numbers_samples() {
        let template = PromptTemplate::for_tab("crem_comply");
        let out = template_detail(template);
        assert!(out.starts_with("CREM Comply (crem_comply)\n\n"));
        assert!(out.contains("Sample prompts:\n1. "));
    }
}
