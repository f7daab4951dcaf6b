//! Activity Log Widget

use crate::agent::ActivityLog;
use crate::tui::theme::Theme;
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Render the newest entries that fit, newest first
pub fn render_activity(frame: &mut Frame, area: Rect, log: &ActivityLog) {
    let block = Block::default()
        .title(format!(" Activity ({}/{}) ", log.len(), log.capacity()))
        .borders(Borders::ALL)
        .border_style(Theme::border());

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if log.is_empty() {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                "No activity yet",
                Theme::text_dim(),
            ))),
            inner,
        );
        return;
    }

    let lines: Vec<Line> = log
        .entries()
        .take(inner.height as usize)
        .map(|entry| {
            let mut spans = vec![
                Span::styled(
                    entry.timestamp.format("%H:%M ").to_string(),
                    Theme::text_dim(),
                ),
                Span::styled(
                    format!("{:<9}", entry.kind.to_string()),
                    Theme::activity_kind(entry.kind),
                ),
                Span::styled(entry.message.clone(), Theme::text()),
            ];
            if let Some(detail) = entry.details.as_ref().and_then(summarize_details) {
                spans.push(Span::styled(format!("  {}", detail), Theme::text_dim()));
            }
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

/// One-line `key=value` rendering of the scalar fields of an entry's details
fn summarize_details(details: &serde_json::Value) -> Option<String> {
    let map = details.as_object()?;
    let parts: Vec<String> = map
        .iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::String(s) => Some(format!("{}={}", key, s)),
            serde_json::Value::Number(n) => Some(format!("{}={}", key, n)),
            serde_json::Value::Bool(b) => Some(format!("{}={}", key, b)),
            _ => None,
        })
        .take(3)
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summarize_details() {
        let details = json!({ "amount": "0.50", "reference": "gpt4-api-1", "nested": { "a": 1 } });
        let summary = summarize_details(&details).unwrap();
        assert!(summary.contains("amount=0.50"));
        assert!(summary.contains("reference=gpt4-api-1"));
        assert!(!summary.contains("nested"));

        assert_eq!(summarize_details(&json!({ "list": [1, 2] })), None);
        assert_eq!(summarize_details(&json!("text")), None);
    }
}
