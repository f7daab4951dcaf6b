//! UI Rendering
//!
//! Main dashboard layout and rendering logic for the TUI.

use crate::agent::AgentState;
use crate::tui::app::{App, View};
use crate::tui::theme::{Icons, Theme};
use crate::tui::widgets;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

/// Render the main UI
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Header
            Constraint::Min(12),    // Body
            Constraint::Length(10), // Activity log
            Constraint::Length(1),  // Status bar
        ])
        .split(frame.area());

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(6)])
        .split(body[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(12), Constraint::Min(4)])
        .split(body[1]);

    let session = app.context.runtime.session();

    render_header(frame, chunks[0], app);
    render_status_card(frame, left[0], app);
    widgets::render_services(
        frame,
        left[1],
        &app.services,
        app.selected,
        session.state().is_processing(),
    );
    let explorer_link = session
        .tx_hash()
        .map(|tx| app.context.config.explorer_tx_url(tx));
    widgets::render_progress(frame, right[0], session, explorer_link, app.tick);
    render_response(frame, right[1], app);
    widgets::render_activity(frame, chunks[2], session.activity());
    render_status_bar(frame, chunks[3], app);

    if app.view == View::Help {
        render_help(frame);
    }
}

/// Title, network, wallet and transaction mode
fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let wallet = app.context.runtime.wallet();
    let mode = app.context.runtime.mode();
    let network = &app.context.config.network;

    let mut spans = vec![
        Span::raw("⚡ "),
        Span::styled("Agent402", Theme::title()),
        Span::styled(" HTTP 402 Payments", Theme::text_secondary()),
        Span::raw("  "),
        Span::styled(format!(" {} ", mode.to_string().to_uppercase()), Theme::mode_badge(mode)),
        Span::raw("  "),
    ];

    match wallet.short_address() {
        Some(address) => {
            spans.push(Span::styled(address, Theme::text()));
            spans.push(Span::styled(
                format!("  {} USDC", wallet.balance_or_zero()),
                Theme::heading(),
            ));
            if wallet.is_on_chain(network.chain_id) {
                spans.push(Span::styled(format!("  {}", network.name), Theme::success()));
            } else {
                spans.push(Span::styled(
                    format!("  Wrong network - press [n] for {}", network.name),
                    Theme::error(),
                ));
            }
        }
        None => spans.push(Span::styled(
            "Wallet not connected - press [c]",
            Theme::warning(),
        )),
    }

    let title = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );

    frame.render_widget(title, area);
}

fn render_status_card(frame: &mut Frame, area: Rect, app: &App) {
    let state = app.context.runtime.session().state();
    let icon = if state.is_processing() {
        Icons::SPINNER[(app.tick % 4) as usize]
    } else {
        match state {
            AgentState::Success => Icons::COMPLETE,
            AgentState::Error => Icons::ERROR,
            _ => Icons::ACTIVE,
        }
    };

    let mut description = state.description().to_string();
    if let Some(error) = app.context.runtime.session().last_error() {
        description = format!("{} ({})", description, error);
    }

    let lines = vec![
        Line::from(vec![
            Span::styled(format!("{} ", icon), Theme::state(state)),
            Span::styled(state.label(), Theme::state(state)),
        ]),
        Line::from(Span::styled(description, Theme::text_secondary())),
    ];

    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .title(" Agent Status ")
            .borders(Borders::ALL)
            .border_style(Theme::border()),
    );
    frame.render_widget(paragraph, area);
}

/// Unlocked content as pretty JSON
fn render_response(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Service Response ")
        .borders(Borders::ALL)
        .border_style(Theme::border());

    let lines: Vec<Line> = match app.context.runtime.session().service_data() {
        Some(data) => serde_json::to_string_pretty(data)
            .unwrap_or_else(|_| data.to_string())
            .lines()
            .map(|line| Line::from(Span::styled(line.to_string(), Theme::text())))
            .collect(),
        None => vec![Line::from(Span::styled(
            "Complete a payment to unlock the service response",
            Theme::text_dim(),
        ))],
    };

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(block);
    frame.render_widget(paragraph, area);
}

fn render_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    let status = match &app.notice {
        Some(notice) => Span::styled(notice.clone(), Theme::warning()),
        None => Span::styled(
            app.context.wallet.control.backend_name().to_string(),
            Theme::text_secondary(),
        ),
    };

    let shortcuts = vec![
        Span::styled(" [↑/↓]", Theme::shortcut_key()),
        Span::styled(" Select ", Theme::shortcut_desc()),
        Span::styled("[Enter]", Theme::shortcut_key()),
        Span::styled(" Request ", Theme::shortcut_desc()),
        Span::styled("[a]", Theme::shortcut_key()),
        Span::styled(" Approve ", Theme::shortcut_desc()),
        Span::styled("[r]", Theme::shortcut_key()),
        Span::styled(" Reset ", Theme::shortcut_desc()),
        Span::styled("[c]", Theme::shortcut_key()),
        Span::styled(" Wallet ", Theme::shortcut_desc()),
        Span::styled("[?]", Theme::shortcut_key()),
        Span::styled(" Help ", Theme::shortcut_desc()),
        Span::styled("[Ctrl+Q]", Theme::shortcut_key()),
        Span::styled(" Quit", Theme::shortcut_desc()),
    ];

    let line = Line::from(
        std::iter::once(status)
            .chain(std::iter::once(Span::raw(" │ ")))
            .chain(shortcuts)
            .collect::<Vec<_>>(),
    );

    frame.render_widget(Paragraph::new(line), area);
}

/// Render the help modal
fn render_help(frame: &mut Frame) {
    let area = centered_rect(60, 70, frame.area());
    frame.render_widget(Clear, area);

    let shortcut = |key: &'static str, desc: &'static str| {
        Line::from(vec![
            Span::styled(format!("{:<13}", key), Theme::shortcut_key()),
            Span::styled(desc, Theme::text()),
        ])
    };

    let help_lines = vec![
        Line::from(Span::styled("Keyboard Shortcuts", Theme::heading())),
        Line::from(""),
        shortcut("↑/↓", "Select a service"),
        shortcut("Enter", "Request the selected service"),
        shortcut("a", "Approve the 402 payment"),
        shortcut("r", "Reset the agent"),
        shortcut("c", "Connect / disconnect wallet"),
        shortcut("n", "Switch to the payment network"),
        shortcut("d", "Decline the next transfer (simulated wallet)"),
        shortcut("Esc", "Clear notice"),
        shortcut("F1 / ?", "Show this help"),
        shortcut("Ctrl+Q", "Quit"),
        Line::from(""),
        Line::from(Span::styled(
            "The agent requests a service, receives HTTP 402 with payment terms,",
            Theme::text_secondary(),
        )),
        Line::from(Span::styled(
            "pays in USDC once approved and unlocks the result with the proof.",
            Theme::text_secondary(),
        )),
        Line::from(""),
        Line::from(Span::styled("Press any key to close", Theme::text_dim())),
    ];

    let paragraph = Paragraph::new(help_lines).block(
        Block::default()
            .title(" Help ")
            .borders(Borders::ALL)
            .border_style(Theme::border_focused()),
    );

    frame.render_widget(paragraph, area);
}

/// Helper to create a centered rect
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::AppContext;
    use ratatui::{backend::TestBackend, Terminal};

    #[test]
    fn test_centered_rect_is_inside_area() {
        let area = Rect::new(0, 0, 100, 50);
        let popup = centered_rect(60, 70, area);
        assert_eq!(popup.width, 60);
        assert!(popup.x >= 20 && popup.right() <= 80);
        assert!(popup.bottom() <= area.bottom());
    }

    #[tokio::test]
    async fn test_dashboard_renders() {
        let app = App::new(AppContext::build(Config::default()).unwrap());
        let mut terminal = Terminal::new(TestBackend::new(140, 45)).unwrap();
        terminal.draw(|frame| render(frame, &app)).unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(text.contains("Agent402"));
        assert!(text.contains("AI Services"));
        assert!(text.contains("Wallet not connected"));
    }
}
